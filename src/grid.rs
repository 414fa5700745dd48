use std::fmt::Write;

use crate::budget_formatter::*;
use crate::draft_store::*;
use crate::overview::*;
use crate::totals::*;
use crate::types::*;

const PENDING_MARKER: char = '*';
const MIN_LABEL_WIDTH: usize = 12;

struct GridLine {
    label: String,
    cells: Vec<String>,
}

pub fn render_budget(store: &DraftStore, overview: &Overview, formatter: &BudgetFormatter) -> String {
    let month_count = store.month_count();
    let mut blocks: Vec<(String, Vec<GridLine>)> = Vec::new();

    for section in store.sections() {
        let mut lines: Vec<GridLine> = section
            .rows
            .iter()
            .map(|row| GridLine {
                label: row.label.clone(),
                cells: (0..month_count)
                    .map(|month_index| {
                        let marker = if store.is_cell_pending(&section.id, &row.id, month_index) {
                            PENDING_MARKER
                        } else {
                            ' '
                        };
                        format!("{}{}", formatter.format_plain(row.value(month_index)), marker)
                    })
                    .collect(),
            })
            .collect();
        lines.push(plain_line(
            &section.footer_label,
            &section_month_totals(section, month_count),
            formatter,
        ));
        let title = if store.has_pending_changes(&section.id) {
            format!("{} {}", section.title, PENDING_MARKER)
        } else {
            section.title.clone()
        };
        blocks.push((title, lines));
    }

    let computed = computed_rows(&overview.sections_computed, store.sections(), month_count);
    let mut computed_lines: Vec<GridLine> = computed
        .iter()
        .map(|row| plain_line(&row.label, &row.values, formatter))
        .collect();
    computed_lines.push(plain_line(
        &overview.sections_computed.footer_label,
        &balance_series(&computed, month_count),
        formatter,
    ));
    blocks.push((overview.sections_computed.title.clone(), computed_lines));

    let label_width = blocks
        .iter()
        .flat_map(|(_, lines)| lines.iter().map(|line| line.label.chars().count() + 2))
        .chain(std::iter::once(MIN_LABEL_WIDTH))
        .max()
        .unwrap_or(MIN_LABEL_WIDTH);
    let cell_width = blocks
        .iter()
        .flat_map(|(_, lines)| lines.iter().flat_map(|line| line.cells.iter()))
        .map(|cell| cell.chars().count())
        .chain(store.months().iter().map(|month| month.0.chars().count() + 1))
        .max()
        .unwrap_or(0);

    let mut output = String::new();
    let _ = write!(output, "{:<width$}", store.year(), width = label_width);
    for month in store.months() {
        let _ = write!(output, " {:>width$}", format!("{} ", month), width = cell_width);
    }
    output.push('\n');
    for (title, lines) in blocks {
        let _ = writeln!(output, "{}", title);
        for line in lines {
            let _ = write!(output, "  {:<width$}", line.label, width = label_width - 2);
            for cell in line.cells {
                let _ = write!(output, " {:>width$}", cell, width = cell_width);
            }
            output.push('\n');
        }
    }
    output
}

pub fn render_pending_entries(
    store: &DraftStore,
    section_id: Option<&SectionId>,
    formatter: &BudgetFormatter,
) -> String {
    let mut output = String::new();
    for entries in store.ledger().as_map().values() {
        for entry in entries {
            if section_id.map_or(false, |id| id != &entry.section_id) {
                continue;
            }
            let _ = writeln!(
                output,
                "{} / {} / {}: {}{} ({})",
                entry.section_id,
                entry.row_label,
                entry.month_label,
                if entry.delta >= 0.0 { "+" } else { "" },
                formatter.format_amount(entry.delta),
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    output
}

fn plain_line(label: &str, values: &[f64], formatter: &BudgetFormatter) -> GridLine {
    GridLine {
        label: label.to_string(),
        cells: values
            .iter()
            .map(|&value| format!("{} ", formatter.format_plain(value)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft_storage::*;
    use crate::overview::fixtures::*;

    fn store_with_edit() -> (DraftStore, Overview) {
        let storage = MemoryDraftStorage::new();
        let overview = food_overview();
        let mut store = DraftStore::new(2025, EngineSettings::default());
        store.hydrate(&overview, &storage);
        store
            .add_to_cell(&SectionId::new("food"), &RowId::new("r1"), 0, 40.0)
            .unwrap();
        (store, overview)
    }

    #[test]
    fn test_render_budget() {
        let (store, overview) = store_with_edit();
        let rendered = render_budget(&store, &overview, &BudgetFormatter::for_overview(&overview));
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("2025"));
        assert!(lines[0].contains("Jan"));
        assert!(lines[0].contains("Dez"));
        assert_eq!(lines[1], "Alimentação *");
        assert!(lines[2].trim_start().starts_with("Mercado"));
        assert!(lines[2].contains("40,00*"));
        assert!(lines[3].contains("Total Alimentação"));
        assert!(lines[3].contains("40,00"));
        assert_eq!(lines[4], "Receitas");
        assert_eq!(lines[7], "SALDO");
        let balance = lines.last().unwrap();
        assert!(balance.trim_start().starts_with("Saldo"));
        assert!(balance.contains("60,00"));
    }

    #[test]
    fn test_render_pending_entries() {
        let (store, overview) = store_with_edit();
        let formatter = BudgetFormatter::for_overview(&overview);
        let rendered = render_pending_entries(&store, None, &formatter);
        assert!(rendered.starts_with("food / Mercado / Jan: +R$ 40,00"));
        assert_eq!(
            render_pending_entries(&store, Some(&SectionId::new("income")), &formatter),
            ""
        );
    }
}
