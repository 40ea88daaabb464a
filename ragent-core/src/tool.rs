//! The [`Tool`] trait and the declarations handed to a model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// A capability the model may decide to invoke.
///
/// The model only ever sees the [`ToolDeclaration`] (name, description and
/// parameter schema); the agent resolves calls back to the implementation by
/// name.
///
/// # Example
///
/// ```rust,ignore
/// let tool: Arc<dyn Tool> = Arc::new(RetrievalTool::new(pipeline, "docs")?);
/// let output = tool.execute(json!({ "query": "pricing" })).await?;
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call the tool.
    fn name(&self) -> &str;

    /// Natural-language description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    /// Run the tool.
    ///
    /// Implementations validate `args` themselves and return
    /// [`RagentError::InvalidToolArguments`](crate::RagentError::InvalidToolArguments)
    /// when they do not match the schema. String results are passed to the
    /// model verbatim; any other value is serialized as JSON.
    async fn execute(&self, args: Value) -> Result<Value>;

    /// The declaration advertised to the model.
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Schema-only description of a tool, without its implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Tool name.
    pub name: String,
    /// Natural-language description.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}
