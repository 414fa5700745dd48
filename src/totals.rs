use std::rc::Rc;

use crate::overview::*;
use crate::types::*;

#[derive(Clone, Debug, PartialEq)]
pub struct ComputedRowValues {
    pub id: RowId,
    pub label: String,
    pub values: Vec<f64>,
}

pub fn section_month_totals(section: &EditableSection, month_count: usize) -> Vec<f64> {
    (0..month_count)
        .map(|month_index| section.rows.iter().map(|row| row.value(month_index)).sum())
        .collect()
}

// Unmatched references yield zeros.
pub fn computed_rows(
    computed: &SectionComputed,
    sections: &[Rc<EditableSection>],
    month_count: usize,
) -> Vec<ComputedRowValues> {
    computed
        .rows
        .iter()
        .map(|row| ComputedRowValues {
            id: row.id.clone(),
            label: row.label.clone(),
            values: sections
                .iter()
                .find(|section| section.title == row.ref_section_title)
                .map(|section| section_month_totals(section, month_count))
                .unwrap_or_else(|| vec![0.0; month_count]),
        })
        .collect()
}

pub fn balance_series(rows: &[ComputedRowValues], month_count: usize) -> Vec<f64> {
    let (base, subtracted) = match rows.split_first() {
        Some(split) => split,
        None => return vec![0.0; month_count],
    };
    (0..month_count)
        .map(|month_index| {
            let value_at = |row: &ComputedRowValues| row.values.get(month_index).cloned().unwrap_or(0.0);
            value_at(base) - subtracted.iter().map(value_at).sum::<f64>()
        })
        .collect()
}
