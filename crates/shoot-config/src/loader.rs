use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_yaml::Value;
use shoot_core::ResponseSchema;

use crate::env::{interpolate, process_env};
use crate::error::{ConfigError, ValidationError};
use crate::model::{
    tool_alias, AgentDoc, AgentProfile, AgentSpec, Budget, CollectorSpec, ConfigDocument,
    Configuration, Connection, DefaultsDoc, McpServerDoc, SubagentDoc, ToolServerSpec,
};
use crate::prompt::PromptTemplate;
use crate::validate::validate_document;

const DEFAULT_SERVER_TIMEOUT_SECS: u64 = 60;

/// Loads, interpolates and validates the configuration file at `path`,
/// reading environment variables from the process.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = load_config_str(&content, &base_dir, &process_env).map_err(|error| match error {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;

    log::info!(
        "Loaded configuration from {}: {} agent(s), {} subagent(s), {} tool server(s)",
        path.display(),
        config.agents.len(),
        config.collectors.len(),
        config.tool_servers.len()
    );
    Ok(config)
}

/// Loads a configuration from YAML text. Relative file references resolve
/// against `base_dir`; `lookup` supplies environment variables.
pub fn load_config_str<F>(
    content: &str,
    base_dir: &Path,
    lookup: &F,
) -> Result<Configuration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut value: Value = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: base_dir.to_path_buf(),
        source,
    })?;

    if !value.is_mapping() {
        return Err(ConfigError::Validation(vec![ValidationError::new(
            "",
            "configuration root must be a mapping",
        )]));
    }

    let mut errors = interpolate(&mut value, lookup);

    let doc: ConfigDocument = match serde_yaml::from_value(value) {
        Ok(doc) => doc,
        Err(error) => {
            errors.push(ValidationError::new("", error.to_string()));
            return Err(ConfigError::Validation(errors));
        }
    };

    errors.extend(validate_document(&doc));

    // The resolver skips dangling references, so file and schema problems are
    // reported together with the structural ones.
    let mut resolver = Resolver {
        base_dir,
        defaults: &doc.defaults,
        errors: Vec::new(),
    };
    let config = resolver.resolve(&doc);
    errors.extend(resolver.errors);

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

struct Resolver<'a> {
    base_dir: &'a Path,
    defaults: &'a DefaultsDoc,
    errors: Vec<ValidationError>,
}

impl Resolver<'_> {
    fn resolve(&mut self, doc: &ConfigDocument) -> Configuration {
        let tool_servers: BTreeMap<String, ToolServerSpec> = doc
            .mcp_servers
            .iter()
            .map(|(id, server)| (id.clone(), tool_server(id, server)))
            .collect();

        let response_schemas = doc
            .response_schemas
            .iter()
            .filter_map(|(id, entry)| {
                let path = format!("response_schemas.{id}.file");
                let document = self.read_json(&path, &entry.file)?;
                let mode = entry.format.unwrap_or(self.defaults.response_format);
                match ResponseSchema::compile(id.clone(), document, entry.description.clone(), mode)
                {
                    Ok(schema) => Some((id.clone(), schema)),
                    Err(message) => {
                        self.errors.push(ValidationError::new(path, message));
                        None
                    }
                }
            })
            .collect();

        let collectors = doc
            .subagents
            .iter()
            .filter_map(|(id, subagent)| {
                let spec = self.collector(id, subagent, &tool_servers)?;
                Some((id.clone(), spec))
            })
            .collect();

        let agents = doc
            .agents
            .iter()
            .filter_map(|(id, agent)| Some((id.clone(), self.agent(id, agent)?)))
            .collect();

        Configuration {
            version: doc.version.clone(),
            source_dir: self.base_dir.to_path_buf(),
            tool_servers,
            collectors,
            agents,
            response_schemas,
            pricing: self.defaults.pricing.clone(),
        }
    }

    fn collector(
        &mut self,
        id: &str,
        doc: &SubagentDoc,
        servers: &BTreeMap<String, ToolServerSpec>,
    ) -> Option<CollectorSpec> {
        let instructions = self.prompt(
            &format!("subagents.{id}"),
            &doc.system_prompt,
            &doc.system_prompt_file,
        )?;

        let allowed_tools = match &doc.allowed_tools {
            Some(tools) => tools.clone(),
            None => doc
                .mcp_servers
                .iter()
                .filter_map(|server| servers.get(server))
                .flat_map(|spec| spec.tools.iter().map(|tool| tool_alias(&spec.id, tool)))
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect(),
        };

        Some(CollectorSpec {
            profile: AgentProfile {
                id: id.to_string(),
                description: doc.description.clone(),
                instructions,
                model: pick_model(&doc.model, &self.defaults.models.collector),
                budget: Budget {
                    max_turns: or_default(doc.max_turns, self.defaults.max_turns.subagent),
                    timeout: Duration::from_secs(or_default(
                        doc.timeout_seconds,
                        self.defaults.timeouts.subagent,
                    )),
                },
                prompt_variables: doc.prompt_variables.clone(),
            },
            servers: doc.mcp_servers.clone(),
            allowed_tools,
        })
    }

    fn agent(&mut self, id: &str, doc: &AgentDoc) -> Option<AgentSpec> {
        let instructions = self.prompt(
            &format!("agents.{id}"),
            &doc.system_prompt,
            &doc.system_prompt_file,
        )?;

        Some(AgentSpec {
            profile: AgentProfile {
                id: id.to_string(),
                description: doc.description.clone(),
                instructions,
                model: pick_model(&doc.model, &self.defaults.models.orchestrator),
                budget: Budget {
                    max_turns: or_default(doc.max_turns, self.defaults.max_turns.investigation),
                    timeout: Duration::from_secs(or_default(
                        doc.timeout_seconds,
                        self.defaults.timeouts.investigation,
                    )),
                },
                prompt_variables: doc.prompt_variables.clone(),
            },
            collectors: doc.subagents.clone(),
            response_schema: doc.response_schema.clone(),
            request_variables: doc.request_variables.clone(),
        })
    }

    fn prompt(
        &mut self,
        path: &str,
        inline: &Option<String>,
        file: &Option<String>,
    ) -> Option<PromptTemplate> {
        if let Some(text) = inline {
            return Some(PromptTemplate::new(text.clone()));
        }
        let file = file.as_ref()?;
        let text = self.read_file(&format!("{path}.system_prompt_file"), file)?;
        Some(PromptTemplate::new(text))
    }

    fn read_file(&mut self, path: &str, file: &str) -> Option<String> {
        let resolved = self.base_dir.join(file);
        if !resolved.is_file() {
            self.errors.push(ValidationError::new(
                path,
                format!("file not found: {}", resolved.display()),
            ));
            return None;
        }

        match fs::read_to_string(&resolved) {
            Ok(text) => Some(text),
            Err(error) => {
                self.errors.push(ValidationError::new(
                    path,
                    format!("failed to read {}: {error}", resolved.display()),
                ));
                None
            }
        }
    }

    fn read_json(&mut self, path: &str, file: &str) -> Option<serde_json::Value> {
        let text = self.read_file(path, file)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(ValidationError::new(
                    path,
                    format!("invalid JSON in {file}: {error}"),
                ));
                None
            }
        }
    }
}

fn tool_server(id: &str, doc: &McpServerDoc) -> ToolServerSpec {
    let connection = match (&doc.command, &doc.url) {
        (Some(command), _) => Connection::Command {
            command: command.clone(),
            args: doc.args.clone(),
            env: doc.env.clone(),
        },
        (None, url) => Connection::Endpoint {
            url: url.clone().unwrap_or_default(),
            headers: doc.headers.clone(),
        },
    };

    ToolServerSpec {
        id: id.to_string(),
        connection,
        tools: doc.tools.clone(),
        request_timeout: Duration::from_secs(
            doc.timeout_seconds.unwrap_or(DEFAULT_SERVER_TIMEOUT_SECS),
        ),
    }
}

fn pick_model(model: &Option<String>, default: &str) -> String {
    model
        .as_deref()
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}
