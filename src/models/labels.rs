use serde::Serialize;

/// Ordered class names; position `i` names output index `i` of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    name: &'static str,
    labels: &'static [&'static str],
}

/// Stage 1 output order
pub const LEAF_LABELS: LabelSet = LabelSet::new("leaf", &["Leaf", "Non-Leaf"]);

/// Stage 2 output order
pub const DISEASE_LABELS: LabelSet = LabelSet::new(
    "disease",
    &["Early Blight", "Healthy", "Late Blight", "Septoria"],
);

/// Stage 1 label that lets an image through to stage 2
pub const LEAF_LABEL: &str = "Leaf";

impl LabelSet {
    pub const fn new(name: &'static str, labels: &'static [&'static str]) -> Self {
        Self { name, labels }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'static str> {
        self.labels.get(index).copied()
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelId;

    #[test]
    fn label_order_matches_model_outputs() {
        assert_eq!(LEAF_LABELS.labels(), &["Leaf", "Non-Leaf"]);
        assert_eq!(
            DISEASE_LABELS.labels(),
            &["Early Blight", "Healthy", "Late Blight", "Septoria"]
        );
        assert_eq!(LEAF_LABELS.get(0), Some(LEAF_LABEL));
    }

    #[test]
    fn sets_are_named_after_their_model() {
        assert_eq!(LEAF_LABELS.name(), ModelId::Leaf.as_str());
        assert_eq!(DISEASE_LABELS.name(), ModelId::Disease.as_str());
    }

    #[test]
    fn out_of_range_index_is_none() {
        assert_eq!(DISEASE_LABELS.get(4), None);
    }
}
