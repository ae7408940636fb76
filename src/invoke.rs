//! Provider functions (`Invoke`).
//!
//! Read-only lookups a program can call without managing a resource.

use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::require_id;
use crate::schema::{Attribute, FunctionSchema};

/// The functions this provider serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// The configured workspace.
    GetWorkspace,
    /// A project by name.
    GetProject,
    /// A workspace member by id.
    GetMember,
    /// A pipeline by project and id.
    GetPipeline,
}

impl Function {
    /// Every function.
    pub const ALL: [Function; 4] = [
        Function::GetWorkspace,
        Function::GetProject,
        Function::GetMember,
        Function::GetPipeline,
    ];

    /// The function's token.
    pub fn token(self) -> &'static str {
        match self {
            Function::GetWorkspace => "buddy:index:getWorkspace",
            Function::GetProject => "buddy:index:getProject",
            Function::GetMember => "buddy:index:getMember",
            Function::GetPipeline => "buddy:index:getPipeline",
        }
    }

    /// Look a function up by token.
    pub fn from_token(token: &str) -> Result<Function, ProviderError> {
        Function::ALL
            .into_iter()
            .find(|f| f.token() == token)
            .ok_or_else(|| ProviderError::UnsupportedKind(token.to_string()))
    }

    /// Argument and result schema.
    pub fn schema(self) -> FunctionSchema {
        match self {
            Function::GetWorkspace => FunctionSchema::new("Look up the configured workspace.")
                .with_output("id", Attribute::computed_int())
                .with_output("name", Attribute::computed_string())
                .with_output("domain", Attribute::computed_string()),
            Function::GetProject => FunctionSchema::new("Look up a project by name.")
                .with_input("name", Attribute::required_string())
                .with_output("display_name", Attribute::computed_string())
                .with_output("status", Attribute::computed_string())
                .with_output("html_url", Attribute::computed_string()),
            Function::GetMember => FunctionSchema::new("Look up a workspace member by id.")
                .with_input("member_id", Attribute::required_int())
                .with_output("email", Attribute::computed_string())
                .with_output("name", Attribute::computed_string()),
            Function::GetPipeline => FunctionSchema::new("Look up a pipeline in a project.")
                .with_input("project_name", Attribute::required_string())
                .with_input("pipeline_id", Attribute::required_int())
                .with_output("name", Attribute::computed_string())
                .with_output("on", Attribute::computed_string()),
        }
    }

    fn path(self, client: &Client, args: &Value) -> Result<String, ProviderError> {
        Ok(match self {
            Function::GetWorkspace => client.workspace_path(""),
            Function::GetProject => {
                client.workspace_path(&format!("/projects/{}", require_id(args, "name")?))
            }
            Function::GetMember => {
                client.workspace_path(&format!("/members/{}", require_id(args, "member_id")?))
            }
            Function::GetPipeline => client.workspace_path(&format!(
                "/projects/{}/pipelines/{}",
                require_id(args, "project_name")?,
                require_id(args, "pipeline_id")?
            )),
        })
    }
}

/// Run the function named by `token`.
pub async fn invoke(client: &Client, token: &str, args: &Value) -> Result<Value, ProviderError> {
    let function = Function::from_token(token)?;
    debug!(token, "Invoking function");
    let path = function.path(client, args)?;
    client.get(&path).await
}
