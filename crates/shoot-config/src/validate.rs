use std::collections::{BTreeMap, BTreeSet};

use crate::error::ValidationError;
use crate::model::{
    split_tool_alias, ConfigDocument, CONFIG_VERSION, INVESTIGATION_TIMEOUT_RANGE,
    INVESTIGATION_TURNS_RANGE, SUBAGENT_TIMEOUT_RANGE, SUBAGENT_TURNS_RANGE,
};

/// Runs every structural and cross-reference check on a document.
///
/// Checks never stop at the first problem; the returned list is complete.
pub fn validate_document(doc: &ConfigDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if doc.version != CONFIG_VERSION {
        errors.push(ValidationError::new(
            "version",
            format!("unsupported version '{}', expected \"{CONFIG_VERSION}\"", doc.version),
        ));
    }

    check_defaults(doc, &mut errors);
    check_servers(doc, &mut errors);
    check_subagents(doc, &mut errors);
    check_agents(doc, &mut errors);
    errors.extend(detect_cycles(doc));

    errors
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    path: &str,
    value: T,
    (min, max): (T, T),
    errors: &mut Vec<ValidationError>,
) {
    if value < min || value > max {
        errors.push(ValidationError::new(
            path,
            format!("{value} is outside the allowed range {min}..={max}"),
        ));
    }
}

fn check_override<T: PartialOrd + std::fmt::Display + Copy + Default>(
    path: &str,
    value: T,
    max: T,
    errors: &mut Vec<ValidationError>,
) {
    if value != T::default() && value > max {
        errors.push(ValidationError::new(
            path,
            format!("{value} exceeds the maximum of {max} (use 0 for the default)"),
        ));
    }
}

fn check_defaults(doc: &ConfigDocument, errors: &mut Vec<ValidationError>) {
    let defaults = &doc.defaults;
    check_range(
        "defaults.timeouts.investigation",
        defaults.timeouts.investigation,
        INVESTIGATION_TIMEOUT_RANGE,
        errors,
    );
    check_range(
        "defaults.timeouts.subagent",
        defaults.timeouts.subagent,
        SUBAGENT_TIMEOUT_RANGE,
        errors,
    );
    check_range(
        "defaults.max_turns.investigation",
        defaults.max_turns.investigation,
        INVESTIGATION_TURNS_RANGE,
        errors,
    );
    check_range(
        "defaults.max_turns.subagent",
        defaults.max_turns.subagent,
        SUBAGENT_TURNS_RANGE,
        errors,
    );

    for (model, pricing) in &defaults.pricing {
        if pricing.input_per_mtok < 0.0 || pricing.output_per_mtok < 0.0 {
            errors.push(ValidationError::new(
                format!("defaults.pricing.{model}"),
                "prices must not be negative",
            ));
        }
    }
}

fn check_servers(doc: &ConfigDocument, errors: &mut Vec<ValidationError>) {
    for (id, server) in &doc.mcp_servers {
        let path = format!("mcp_servers.{id}");

        if id.contains("__") {
            errors.push(ValidationError::new(
                &path,
                "server ids must not contain '__'",
            ));
        }

        match (&server.command, &server.url) {
            (Some(_), Some(_)) => errors.push(ValidationError::new(
                &path,
                "set either 'command' or 'url', not both",
            )),
            (None, None) => errors.push(ValidationError::new(
                &path,
                "one of 'command' or 'url' is required",
            )),
            (Some(command), None) if command.trim().is_empty() => {
                errors.push(ValidationError::new(
                    format!("{path}.command"),
                    "command must not be empty",
                ))
            }
            (None, Some(url)) => match url::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ValidationError::new(
                    format!("{path}.url"),
                    format!("unsupported scheme '{}', expected http or https", parsed.scheme()),
                )),
                Err(error) => errors.push(ValidationError::new(
                    format!("{path}.url"),
                    format!("invalid URL: {error}"),
                )),
            },
            _ => {}
        }

        if server.tools.is_empty() {
            errors.push(ValidationError::new(
                format!("{path}.tools"),
                "at least one tool must be allow-listed",
            ));
        }

        if server.timeout_seconds == Some(0) {
            errors.push(ValidationError::new(
                format!("{path}.timeout_seconds"),
                "must be greater than zero",
            ));
        }
    }
}

fn check_prompt_source(
    path: &str,
    inline: &Option<String>,
    file: &Option<String>,
    errors: &mut Vec<ValidationError>,
) {
    match (inline, file) {
        (Some(_), Some(_)) => errors.push(ValidationError::new(
            path,
            "set either 'system_prompt' or 'system_prompt_file', not both",
        )),
        (None, None) => errors.push(ValidationError::new(
            path,
            "one of 'system_prompt' or 'system_prompt_file' is required",
        )),
        _ => {}
    }
}

fn check_subagents(doc: &ConfigDocument, errors: &mut Vec<ValidationError>) {
    for (id, subagent) in &doc.subagents {
        let path = format!("subagents.{id}");

        if doc.agents.contains_key(id) {
            errors.push(ValidationError::new(
                &path,
                format!("'{id}' is also defined as an agent"),
            ));
        }

        check_prompt_source(&path, &subagent.system_prompt, &subagent.system_prompt_file, errors);
        check_override(
            &format!("{path}.timeout_seconds"),
            subagent.timeout_seconds,
            SUBAGENT_TIMEOUT_RANGE.1,
            errors,
        );
        check_override(
            &format!("{path}.max_turns"),
            subagent.max_turns,
            SUBAGENT_TURNS_RANGE.1,
            errors,
        );

        if subagent.mcp_servers.is_empty() {
            errors.push(ValidationError::new(
                format!("{path}.mcp_servers"),
                "a subagent needs at least one tool server",
            ));
        }

        for server in &subagent.mcp_servers {
            if !doc.mcp_servers.contains_key(server) {
                errors.push(ValidationError::new(
                    format!("{path}.mcp_servers"),
                    format!("unknown tool server '{server}'"),
                ));
            }
        }

        for tool in subagent.allowed_tools.iter().flatten() {
            let tool_path = format!("{path}.allowed_tools");
            let Some((server, name)) = split_tool_alias(tool) else {
                errors.push(ValidationError::new(
                    tool_path,
                    format!("'{tool}' must have the form mcp__<server>__<tool>"),
                ));
                continue;
            };

            if !subagent.mcp_servers.iter().any(|declared| declared == server) {
                errors.push(ValidationError::new(
                    tool_path,
                    format!("'{tool}' refers to server '{server}' which this subagent does not declare"),
                ));
            } else if let Some(spec) = doc.mcp_servers.get(server) {
                if !spec.tools.iter().any(|allowed| allowed == name) {
                    errors.push(ValidationError::new(
                        tool_path,
                        format!("'{tool}' is not in the allow-list of server '{server}'"),
                    ));
                }
            }
        }
    }
}

fn check_agents(doc: &ConfigDocument, errors: &mut Vec<ValidationError>) {
    if doc.agents.is_empty() {
        errors.push(ValidationError::new("agents", "at least one agent is required"));
    }

    for (id, agent) in &doc.agents {
        let path = format!("agents.{id}");

        check_prompt_source(&path, &agent.system_prompt, &agent.system_prompt_file, errors);
        check_override(
            &format!("{path}.timeout_seconds"),
            agent.timeout_seconds,
            INVESTIGATION_TIMEOUT_RANGE.1,
            errors,
        );
        check_override(
            &format!("{path}.max_turns"),
            agent.max_turns,
            INVESTIGATION_TURNS_RANGE.1,
            errors,
        );

        if agent.subagents.is_empty() {
            errors.push(ValidationError::new(
                format!("{path}.subagents"),
                "an agent must delegate to at least one subagent",
            ));
        }

        for subagent in &agent.subagents {
            if !doc.subagents.contains_key(subagent) {
                errors.push(ValidationError::new(
                    format!("{path}.subagents"),
                    format!("unknown subagent '{subagent}'"),
                ));
            }
        }

        if let Some(schema) = &agent.response_schema {
            if !doc.response_schemas.contains_key(schema) {
                errors.push(ValidationError::new(
                    format!("{path}.response_schema"),
                    format!("unknown response schema '{schema}'"),
                ));
            }
        }
    }
}

/// Finds cycles in the delegation graph.
///
/// Nodes are agent and subagent ids. Agents point at their subagents; a
/// subagent points at any agent or subagent named in its server list, which
/// is how a collector could reach back up the hierarchy.
pub fn detect_cycles(doc: &ConfigDocument) -> Vec<ValidationError> {
    let mut graph: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let is_node = |name: &str| doc.agents.contains_key(name) || doc.subagents.contains_key(name);

    for (id, agent) in &doc.agents {
        let edges: Vec<&str> = agent
            .subagents
            .iter()
            .map(String::as_str)
            .filter(|target| is_node(target))
            .collect();
        graph.insert(id.as_str(), edges);
    }
    for (id, subagent) in &doc.subagents {
        let edges: Vec<&str> = subagent
            .mcp_servers
            .iter()
            .map(String::as_str)
            .filter(|target| is_node(target))
            .collect();
        graph.entry(id.as_str()).or_default().extend(edges);
    }

    let mut errors = Vec::new();
    let mut reported: BTreeSet<Vec<&str>> = BTreeSet::new();
    let mut done: BTreeSet<&str> = BTreeSet::new();

    // Agents first, so reported cycles read top-down.
    let starts = doc
        .agents
        .keys()
        .chain(doc.subagents.keys())
        .map(String::as_str);

    for start in starts {
        let mut stack = Vec::new();
        visit(start, &graph, &mut stack, &mut done, &mut |cycle| {
            let mut key = cycle.to_vec();
            key.sort();
            if reported.insert(key) {
                errors.push(ValidationError::new(
                    "delegation",
                    format!("cycle detected: {}", cycle.join(" -> ")),
                ));
            }
        });
    }

    errors
}

fn visit<'a>(
    node: &'a str,
    graph: &BTreeMap<&'a str, Vec<&'a str>>,
    stack: &mut Vec<&'a str>,
    done: &mut BTreeSet<&'a str>,
    on_cycle: &mut dyn FnMut(&[&'a str]),
) {
    if let Some(position) = stack.iter().position(|entry| *entry == node) {
        let mut cycle = stack[position..].to_vec();
        cycle.push(node);
        on_cycle(&cycle);
        return;
    }
    if done.contains(node) {
        return;
    }

    stack.push(node);
    for next in graph.get(node).into_iter().flatten() {
        visit(next, graph, stack, done, on_cycle);
    }
    stack.pop();
    done.insert(node);
}
