use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::*;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    #[serde(default)]
    pub version: Option<i64>,
    pub year: i32,
    pub currency: String,
    pub locale: String,
    pub months: Vec<MonthKey>,
    pub sections_editable: Vec<SectionEditable>,
    pub sections_computed: SectionComputed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEditable {
    pub id: SectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub footer_label: String,
    #[serde(default)]
    pub is_system_default: bool,
    #[serde(default)]
    pub rows: Vec<SectionEditableRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEditableRow {
    pub id: RowId,
    pub label: String,
    #[serde(default)]
    pub values: HashMap<MonthKey, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionComputed {
    pub id: SectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub footer_label: String,
    #[serde(default)]
    pub rows: Vec<ComputedRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedRow {
    pub id: RowId,
    pub label: String,
    pub ref_section_title: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableSection {
    pub id: SectionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub footer_label: String,
    #[serde(default)]
    pub is_system_default: bool,
    #[serde(default)]
    pub rows: Vec<Rc<Row>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub label: String,
    #[serde(default)]
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAssignment {
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_group_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoryAssignmentsRequest<'a> {
    pub assignments: &'a [CategoryAssignment],
}

#[derive(Debug, Serialize)]
pub struct CreateGroupRequest<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct RenameGroupRequest<'a> {
    pub title: &'a str,
}

impl Overview {
    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn month_label(&self, month_index: usize) -> Option<&MonthKey> {
        self.months.get(month_index)
    }

    pub fn find_month_index(&self, month: &str) -> Option<usize> {
        let month = month.trim();
        if let Ok(number) = month.parse::<usize>() {
            return if number >= 1 && number <= self.months.len() {
                Some(number - 1)
            } else {
                None
            };
        }
        self.months
            .iter()
            .position(|key| key.0.eq_ignore_ascii_case(month))
    }

    pub fn working_sections(&self) -> Vec<Rc<EditableSection>> {
        self.sections_editable
            .iter()
            .map(|section| Rc::new(section.to_working(&self.months)))
            .collect()
    }
}

impl SectionEditable {
    pub fn to_working(&self, months: &[MonthKey]) -> EditableSection {
        EditableSection {
            id: self.id.clone(),
            title: self.title.clone(),
            color: self.color.clone(),
            footer_label: self.footer_label.clone(),
            is_system_default: self.is_system_default,
            rows: self
                .rows
                .iter()
                .map(|row| {
                    Rc::new(Row {
                        id: row.id.clone(),
                        label: row.label.clone(),
                        values: months
                            .iter()
                            .map(|month| row.values.get(month).cloned().unwrap_or(0.0))
                            .collect(),
                    })
                })
                .collect(),
        }
    }
}

impl EditableSection {
    pub fn find_row(&self, row_id: &RowId) -> Option<&Rc<Row>> {
        self.rows.iter().find(|row| &row.id == row_id)
    }

    pub fn find_row_by_id_or_label(&self, row: &str) -> Option<&Rc<Row>> {
        self.rows
            .iter()
            .find(|r| r.id.0 == row)
            .or_else(|| self.rows.iter().find(|r| r.label == row))
    }
}

impl Row {
    pub fn value(&self, month_index: usize) -> f64 {
        self.values.get(month_index).cloned().unwrap_or(0.0)
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub const MONTHS: [&str; 12] = [
        "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
    ];

    pub fn months() -> Vec<MonthKey> {
        MONTHS.iter().map(|&month| MonthKey::new(month)).collect()
    }

    pub fn editable_row(id: &str, label: &str, values: &[(usize, f64)]) -> SectionEditableRow {
        SectionEditableRow {
            id: RowId::new(id),
            label: label.to_string(),
            values: values
                .iter()
                .map(|&(index, value)| (MonthKey::new(MONTHS[index]), value))
                .collect(),
        }
    }

    pub fn editable_section(
        id: &str,
        title: &str,
        rows: Vec<SectionEditableRow>,
    ) -> SectionEditable {
        SectionEditable {
            id: SectionId::new(id),
            title: title.to_string(),
            color: None,
            footer_label: format!("Total {}", title),
            is_system_default: false,
            rows,
        }
    }

    pub fn overview(year: i32, sections_editable: Vec<SectionEditable>) -> Overview {
        Overview {
            version: Some(1),
            year,
            currency: "BRL".to_string(),
            locale: "pt-BR".to_string(),
            months: months(),
            sections_editable,
            sections_computed: SectionComputed {
                id: SectionId::new("saldo"),
                title: "SALDO".to_string(),
                color: Some("#333333".to_string()),
                footer_label: "Saldo".to_string(),
                rows: vec![
                    ComputedRow {
                        id: RowId::new("c-income"),
                        label: "Receitas".to_string(),
                        ref_section_title: "Receitas".to_string(),
                    },
                    ComputedRow {
                        id: RowId::new("c-food"),
                        label: "Alimentação".to_string(),
                        ref_section_title: "Alimentação".to_string(),
                    },
                ],
            },
        }
    }

    pub fn food_overview() -> Overview {
        overview(
            2025,
            vec![
                editable_section("food", "Alimentação", vec![editable_row("r1", "Mercado", &[])]),
                editable_section(
                    "income",
                    "Receitas",
                    vec![editable_row("salary", "Salário", &[(0, 100.0)])],
                ),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_to_working_orders_values_by_months() {
        let section = editable_section(
            "food",
            "Alimentação",
            vec![editable_row("r1", "Mercado", &[(11, 7.5), (0, 10.0)])],
        );
        let working = section.to_working(&months());
        assert_eq!(working.rows.len(), 1);
        assert_eq!(working.rows[0].values.len(), 12);
        assert_eq!(working.rows[0].values[0], 10.0);
        assert_eq!(working.rows[0].values[11], 7.5);
        assert_eq!(working.rows[0].values[5], 0.0);
    }

    #[test]
    fn test_overview_deserializes_from_api_json() {
        let json = r##"{
            "version": 3,
            "year": 2025,
            "currency": "BRL",
            "locale": "pt-BR",
            "months": ["Jan","Fev","Mar","Abr","Mai","Jun","Jul","Ago","Set","Out","Nov","Dez"],
            "sectionsEditable": [{
                "id": "food",
                "title": "Alimentação",
                "footerLabel": "Total",
                "isSystemDefault": true,
                "rows": [{"id": "r1", "label": "Mercado", "values": {"Fev": 12.5}}]
            }],
            "sectionsComputed": {
                "id": "saldo",
                "title": "SALDO",
                "color": "#000000",
                "footerLabel": "Saldo",
                "rows": [{"id": "c1", "label": "Alimentação", "refSectionTitle": "Alimentação"}]
            }
        }"##;
        let overview: Overview = serde_json::from_str(json).unwrap();
        assert_eq!(overview.month_count(), 12);
        assert!(overview.sections_editable[0].is_system_default);
        assert_eq!(overview.sections_editable[0].color, None);
        let working = overview.working_sections();
        assert_eq!(working[0].rows[0].values[1], 12.5);
        assert_eq!(
            overview.sections_computed.rows[0].ref_section_title,
            "Alimentação"
        );
    }

    #[test]
    fn test_find_month_index() {
        let overview = food_overview();
        assert_eq!(overview.find_month_index("1"), Some(0));
        assert_eq!(overview.find_month_index("12"), Some(11));
        assert_eq!(overview.find_month_index("13"), None);
        assert_eq!(overview.find_month_index("0"), None);
        assert_eq!(overview.find_month_index("fev"), Some(1));
        assert_eq!(overview.find_month_index("Smarch"), None);
    }

    #[test]
    fn test_row_value_defaults_to_zero() {
        let row = Row {
            id: RowId::new("r"),
            label: "R".to_string(),
            values: vec![1.0],
        };
        assert_eq!(row.value(0), 1.0);
        assert_eq!(row.value(7), 0.0);
    }

    #[test]
    fn test_category_assignment_omits_missing_group() {
        let assignments = [
            CategoryAssignment {
                category_id: "c1".to_string(),
                budget_group_id: Some("food".to_string()),
            },
            CategoryAssignment {
                category_id: "c2".to_string(),
                budget_group_id: None,
            },
        ];
        assert_eq!(
            serde_json::to_string(&CategoryAssignmentsRequest {
                assignments: &assignments
            })
            .unwrap(),
            r#"{"assignments":[{"categoryId":"c1","budgetGroupId":"food"},{"categoryId":"c2"}]}"#
        );
    }
}
