#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl Model {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

pub fn default_models() -> Vec<Model> {
    vec![
        Model::new("openai/gpt-4o", "GPT 4o").with_description("General purpose default"),
        Model::new("deepseek/deepseek-r1", "Deepseek R1")
            .with_description("Reasoning-forward model"),
    ]
}

/// Looks up a model by exact id.
pub fn find_model<'a>(models: &'a [Model], model_id: &str) -> Option<&'a Model> {
    models.iter().find(|model| model.id == model_id)
}
