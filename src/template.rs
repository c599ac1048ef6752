//! Record templates: named, ordered lists of fields to read from a document.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// One extractable datum within a record template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Stable key used in the accumulated record
    pub key: String,
    /// Human-readable label (also drives charset selection)
    pub label: String,
}

impl FieldDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// A named, ordered sequence of fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTemplate {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl RecordTemplate {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Looks up a field by key.
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Looks up a field by key, failing with `UnknownField`.
    pub fn require_field(&self, key: &str) -> Result<&FieldDefinition> {
        self.field(key).ok_or_else(|| ScanError::UnknownField {
            template: self.name.clone(),
            key: key.to_string(),
        })
    }
}

/// Name → template mapping, kept in insertion order for display.
#[derive(Clone, Debug, Default)]
pub struct TemplateCatalog {
    templates: Vec<RecordTemplate>,
}

impl TemplateCatalog {
    /// The two templates shipped with the tool: the cover sheet and the
    /// payment detail sheet.
    pub fn builtin() -> Self {
        let cover = RecordTemplate::new(
            "OCR-Data",
            vec![
                FieldDefinition::new("dantai_name", "団体名称"),
                FieldDefinition::new("daihyousha", "代表者氏名"),
                FieldDefinition::new("kaikei_sekinin", "会計責任者"),
                FieldDefinition::new("jimutantou", "事務担当者"),
                FieldDefinition::new("date_koushutsu", "公出年月日"),
            ],
        );
        let payments = RecordTemplate::new(
            "支払明細",
            vec![
                FieldDefinition::new("no", "番号(No)"),
                FieldDefinition::new("kingaku", "金額"),
                FieldDefinition::new("shishutsu_date", "支出年月日"),
                FieldDefinition::new("shishutsu_mokuteki", "支出の目的"),
                FieldDefinition::new("shishutsu_saki", "支出先名称"),
            ],
        );
        Self {
            templates: vec![cover, payments],
        }
    }

    /// Adds a template, replacing any existing one with the same name.
    pub fn insert(&mut self, template: RecordTemplate) {
        match self.templates.iter_mut().find(|t| t.name == template.name) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn get(&self, name: &str) -> Result<&RecordTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ScanError::UnknownTemplate(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordTemplate> {
        self.templates.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let catalog = TemplateCatalog::builtin();
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["OCR-Data", "支払明細"]);

        let payments = catalog.get("支払明細").unwrap();
        assert_eq!(payments.fields.len(), 5);
        assert_eq!(payments.field("kingaku").unwrap().label, "金額");
    }

    #[test]
    fn test_unknown_template_and_field() {
        let catalog = TemplateCatalog::builtin();
        assert!(matches!(
            catalog.get("missing"),
            Err(ScanError::UnknownTemplate(_))
        ));

        let cover = catalog.get("OCR-Data").unwrap();
        assert!(cover.field("kingaku").is_none());
        assert!(matches!(
            cover.require_field("kingaku"),
            Err(ScanError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_insert_replaces_by_name() {
        let mut catalog = TemplateCatalog::builtin();
        catalog.insert(RecordTemplate::new(
            "OCR-Data",
            vec![FieldDefinition::new("only", "唯一")],
        ));
        catalog.insert(RecordTemplate::new("領収書", vec![]));

        assert_eq!(catalog.get("OCR-Data").unwrap().fields.len(), 1);
        assert_eq!(catalog.iter().count(), 3);
    }
}
