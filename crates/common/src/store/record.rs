//! Vector record entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vector_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Named collection the record belongs to
    pub collection: String,

    /// Content identifier, filterable
    pub content_hash: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Flattened metadata as a JSON object
    #[sea_orm(column_type = "Text")]
    pub metadata: String,

    /// Embedding stored as text, format "[1.0,2.0,3.0,...]"
    #[sea_orm(column_type = "Text")]
    pub embedding: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Parse embedding from stored text format to Vec<f32>
    pub fn parse_embedding(&self) -> Option<Vec<f32>> {
        let inner = self.embedding.trim().trim_start_matches('[').trim_end_matches(']');
        if inner.trim().is_empty() {
            return Some(Vec::new());
        }
        inner
            .split(',')
            .map(|v| v.trim().parse::<f32>().ok())
            .collect()
    }
}

/// Format an embedding for storage
pub fn format_embedding(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_embedding(embedding: &str) -> Model {
        Model {
            id: "1".into(),
            collection: "test".into(),
            content_hash: "abc".into(),
            content: "text".into(),
            metadata: "{}".into(),
            embedding: embedding.into(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_embedding_format() {
        assert_eq!(format_embedding(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(format_embedding(&[]), "[]");
    }

    #[test]
    fn test_parse_embedding() {
        let model = model_with_embedding("[0.1, -0.5,1]");
        assert_eq!(model.parse_embedding(), Some(vec![0.1, -0.5, 1.0]));

        let model = model_with_embedding("[0.1,oops]");
        assert_eq!(model.parse_embedding(), None);
    }
}
