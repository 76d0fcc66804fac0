//! Export of a network as C++-like class text.
//!
//! Every node answers [`Node::cpp_code`](crate::Node::cpp_code) for each
//! [`CodeLocation`]; containers compose the answers of their children. The
//! root additionally emits a full class with parameter definitions, initial
//! values, internal modulation and macro parameter callbacks.
//!
//! The output is meant for humans and for diffing. Its grammar is not stable.

use core::fmt::Write as _;

use crate::connection::Connection;
use crate::container::{ContainerKind, NodeContainer};
use crate::ids::props;
use crate::network::Network;
use crate::node::{Node, NodeBase, NodeRef};
use crate::range::{OperatorType, ParameterRange};

/// Section of the emitted class a node contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeLocation {
    /// Type definitions that must precede the class.
    Definitions,
    /// Body of `prepare`.
    PrepareBody,
    /// Body of `process`.
    ProcessBody,
    /// Body of `processSingle`.
    ProcessSingleBody,
    /// Body of `handleModulation`.
    HandleModulationBody,
    /// Member declarations.
    PrivateMembers,
    /// `using` aliases for the nested container types.
    TemplateAlias,
}

/// A function to emit.
#[derive(Debug, Clone, Default)]
pub struct MethodInfo {
    /// Text before the name, e.g. a return type.
    pub return_type: String,
    /// Function name (or lambda capture list).
    pub name: String,
    /// Argument declarations.
    pub arguments: Vec<String>,
    /// Text after the argument list.
    pub specifiers: String,
    /// Body lines.
    pub body: String,
    /// Appends `;` after the closing brace (lambdas).
    pub add_semicolon: bool,
}

/// Formatting helpers shared by every emitter.
pub struct Emitter;

impl Emitter {
    /// Appends a `// ===...` comment line.
    pub fn comment_line(out: &mut String, text: &str) {
        let _ = writeln!(out, "// {text} {}", "=".repeat(60usize.saturating_sub(text.len())));
        out.push('\n');
    }

    /// Number literal that always carries a decimal point.
    pub fn pretty_number(value: f64, as_float: bool) -> String {
        let mut s = if value.fract() == 0.0 && value.is_finite() {
            format!("{value:.1}")
        } else {
            format!("{value}")
        };
        if as_float {
            s.push('f');
        }
        s
    }

    /// `{ min, max, step[, skew] }`
    pub fn range_string(range: ParameterRange) -> String {
        let mut s = format!(
            "{{ {}, {}, {}",
            Self::pretty_number(range.min, false),
            Self::pretty_number(range.max, false),
            Self::pretty_number(range.step, false)
        );
        if range.skew != 1.0 {
            let _ = write!(s, ", {}", Self::pretty_number(range.skew, false));
        }
        s.push_str(" }");
        s
    }

    /// Appends a function definition.
    pub fn function(out: &mut String, method: &MethodInfo) {
        if !method.return_type.is_empty() {
            out.push_str(&method.return_type);
            if !method.return_type.ends_with(' ') {
                out.push(' ');
            }
        }
        let _ = writeln!(
            out,
            "{}({}){}",
            method.name,
            method.arguments.join(", "),
            method.specifiers
        );
        out.push_str("{\n");
        out.push_str(&method.body);
        if !method.body.is_empty() && !method.body.ends_with('\n') {
            out.push('\n');
        }
        out.push('}');
        if method.add_semicolon {
            out.push(';');
        }
        out.push_str("\n\n");
    }

    /// Wraps `content` in a braced block.
    pub fn brackets(content: &str) -> String {
        format!("{{\n{content}\n}}\n")
    }

    /// `struct instance : public <base> { ... };`
    pub fn class(content: &str, base_class: &str) -> String {
        format!("struct instance : public {base_class}\n{{\n{content}}};\n")
    }

    /// `namespace <name> { ... }`
    pub fn namespace(content: &str, name: &str) -> String {
        format!("namespace {name}\n{{\n\n{content}\n}}\n")
    }

    /// `using <alias> = <target>;`
    pub fn alias(alias: &str, target: &str) -> String {
        format!("using {alias} = {target};\n")
    }

    /// `template <...> using` line for a container type.
    pub fn template_alias(alias: &str, template: &str, arguments: &[String]) -> String {
        if arguments.is_empty() {
            return format!("using {alias} = {template}<>;\n");
        }
        let mut s = format!("using {alias} = {template}<");
        let indent = " ".repeat(s.len());
        for (i, arg) in arguments.iter().enumerate() {
            if i > 0 {
                s.push_str(",\n");
                s.push_str(&indent);
            }
            s.push_str(arg);
        }
        s.push_str(">;\n");
        s
    }

    /// Re-indents `code` by brace depth, four spaces per level.
    pub fn indent(code: &str) -> String {
        let mut out = String::with_capacity(code.len() + code.len() / 4);
        let mut depth: usize = 0;
        for line in code.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                out.push('\n');
                continue;
            }
            let leading_close = trimmed.starts_with('}');
            let level = if leading_close { depth.saturating_sub(1) } else { depth };
            out.push_str(&"    ".repeat(level));
            out.push_str(trimmed);
            out.push('\n');

            let opens = trimmed.matches('{').count();
            let closes = trimmed.matches('}').count();
            depth = (depth + opens).saturating_sub(closes);
        }
        out
    }
}

/// Type name of `node` in emitted code.
pub fn class_name(node: &dyn Node) -> String {
    if node.as_container().is_some() {
        format!("{}_", node.base().id())
    } else {
        node.base().factory_path().replace('.', "::")
    }
}

fn identifier(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Code for a leaf node.
pub fn leaf_code(base: &NodeBase, location: CodeLocation) -> String {
    let id = base.id();
    match location {
        CodeLocation::Definitions | CodeLocation::TemplateAlias => String::new(),
        CodeLocation::PrivateMembers => {
            format!("{} {id};\n", base.factory_path().replace('.', "::"))
        }
        CodeLocation::PrepareBody => format!("{id}.prepare(ps);\n"),
        CodeLocation::ProcessBody => format!("{id}.process(data);\n"),
        CodeLocation::ProcessSingleBody => format!("{id}.processSingle(frame, numChannels);\n"),
        CodeLocation::HandleModulationBody => "return false;\n".to_string(),
    }
}

/// Code for a container.
pub fn container_code(container: &NodeContainer, location: CodeLocation) -> String {
    let id = container.base().id();
    let nodes = container.nodes();
    match location {
        CodeLocation::TemplateAlias => {
            let mut s: String = nodes
                .iter()
                .map(|n| n.cpp_code(CodeLocation::TemplateAlias))
                .collect();
            let children: Vec<String> = nodes.iter().map(|n| class_name(n.as_ref())).collect();
            let template = container.kind().factory_path().replace('.', "::");
            s.push_str(&Emitter::template_alias(&format!("{id}_"), &template, &children));
            s
        }
        CodeLocation::Definitions => nodes
            .iter()
            .map(|n| n.cpp_code(CodeLocation::Definitions))
            .collect(),
        CodeLocation::PrivateMembers => format!("{id}_ {id};\n"),
        CodeLocation::PrepareBody => format!("{id}.prepare(ps);\n"),
        CodeLocation::ProcessBody => format!("{id}.process(data);\n"),
        CodeLocation::ProcessSingleBody => format!("{id}.processSingle(frame, numChannels);\n"),
        CodeLocation::HandleModulationBody => {
            if container.kind() == ContainerKind::ModulationChain {
                format!("return {id}.handleModulation(value);\n")
            } else {
                "return false;\n".to_string()
            }
        }
    }
}

struct Accessor {
    id: String,
    get: String,
}

fn fill_accessors(container: &NodeContainer, outer: &str, out: &mut Vec<Accessor>) {
    for (index, node) in container.nodes().iter().enumerate() {
        let get = format!("get<{index}>({outer})");
        if let Some(child) = node.as_container() {
            fill_accessors(child, &get, out);
        }
        out.push(Accessor {
            id: node.base().id().to_string(),
            get,
        });
    }
}

fn connection_lines(code: &mut String, connections: &[Connection]) -> Vec<String> {
    connections
        .iter()
        .map(|c| {
            let target = format!("{}.{}", c.node_id(), c.parameter_id());
            let name = identifier(&target);
            let _ = writeln!(code, "auto {name} = getParameter(\"{target}\");");
            let _ = writeln!(code, "{name}.range = {};", Emitter::range_string(c.range()));
            if c.is_inverted() {
                let _ = writeln!(code, "{name}.inverted = true;");
            }
            if let Some(converter) = c.converter() {
                let _ = writeln!(code, "{name}.converter = \"{converter}\";");
            }
            if c.op_type() != OperatorType::SetValue {
                let _ = writeln!(code, "{name}.op = \"{}\";", c.op_type());
            }
            name
        })
        .collect()
}

fn modulation_block(node: &NodeRef, accessors: &[Accessor]) -> Option<String> {
    let container = node.as_container()?;
    let targets = container.modulation_targets()?;
    let connections = targets.connections();
    if connections.is_empty() {
        return None;
    }

    let mut code = String::new();
    let names = connection_lines(&mut code, &connections);
    let body: String = names.iter().map(|n| format!("{n}(newValue);\n")).collect();
    Emitter::function(
        &mut code,
        &MethodInfo {
            return_type: "auto f = ".to_string(),
            name: format!("[{}]", names.join(", ")),
            arguments: vec!["double newValue".to_string()],
            body,
            add_semicolon: true,
            ..MethodInfo::default()
        },
    );
    let accessor = accessors
        .iter()
        .find(|a| a.id == node.base().id())
        .map_or("obj", |a| a.get.as_str());
    let _ = writeln!(code, "setInternalModulationParameter({accessor}, f);");
    Some(Emitter::brackets(&code))
}

/// Emits the whole network as one namespaced class called `class_name`.
pub fn create_cpp_class(network: &Network, class_name: &str) -> String {
    let root = network.root();
    let root_node: NodeRef = root.clone();

    let mut s = String::new();
    Emitter::comment_line(&mut s, "Template Alias Definition");
    s.push_str(&root.cpp_code(CodeLocation::TemplateAlias));
    s.push('\n');

    let mut content = root.cpp_code(CodeLocation::Definitions);

    let mut accessors = Vec::new();
    fill_accessors(root, "obj", &mut accessors);

    let mut pb = String::new();
    for a in &accessors {
        let _ = writeln!(pb, "auto& {} = {}; // {}", identifier(&a.id), a.get, a.id);
    }
    pb.push('\n');

    Emitter::comment_line(&mut pb, "Parameter Initalisation");
    for node in root.child_nodes_recursive() {
        for p in node.parameters() {
            let _ = writeln!(
                pb,
                "initValues.add({{ \"{}.{}\", {} }});",
                node.base().id(),
                p.id(),
                Emitter::pretty_number(p.value(), false)
            );
        }
    }
    pb.push_str("initStaticParameterData();\n\n");

    Emitter::comment_line(&mut pb, "Internal Modulation");
    let sources = std::iter::once(root_node).chain(root.child_nodes_recursive());
    for node in sources {
        if let Some(block) = modulation_block(&node, &accessors) {
            pb.push_str(&block);
        }
    }

    Emitter::comment_line(&mut pb, "Parameter Callbacks");
    for m in root.macro_parameters() {
        let mut code = String::new();
        let input = m.parameter().range();
        let _ = writeln!(code, "ParameterData p(\"{}\");", m.id());
        let _ = writeln!(code, "p.range = {};", Emitter::range_string(input));
        code.push_str("auto rangeCopy = p.range;\n\n");

        let connections = m.connections();
        let names = connection_lines(&mut code, &connections);
        code.push('\n');

        let mut body = String::from("auto normalised = rangeCopy.convertTo0to1(newValue);\n");
        for (name, c) in names.iter().zip(&connections) {
            if c.parameter_id() == props::BYPASSED {
                let _ = writeln!(body, "{name}.setBypass(newValue);");
            } else {
                let _ = writeln!(body, "{name}(normalised);");
            }
        }
        let mut captures = names.clone();
        captures.push("rangeCopy".to_string());
        Emitter::function(
            &mut code,
            &MethodInfo {
                return_type: "p.db = ".to_string(),
                name: format!("[{}]", captures.join(", ")),
                arguments: vec!["double newValue".to_string()],
                body,
                add_semicolon: true,
                ..MethodInfo::default()
            },
        );
        code.push_str("\ndata.add(std::move(p));\n");
        pb.push_str(&Emitter::brackets(&code));
    }

    Emitter::function(
        &mut content,
        &MethodInfo {
            return_type: "void".to_string(),
            name: "createParameters".to_string(),
            arguments: vec!["Array<ParameterData>& data".to_string()],
            body: pb,
            ..MethodInfo::default()
        },
    );

    s.push_str(&Emitter::class(&content, &self::class_name(root.as_ref())));
    let s = Emitter::indent(&s);

    let mut out = Emitter::namespace(&s, &format!("{class_name}_impl"));
    out.push('\n');
    out.push_str(&Emitter::alias(class_name, &format!("{class_name}_impl::instance")));
    out
}
