use std::collections::{HashMap, HashSet};

use crate::builder::{tensor_i64, tensor_type, Dim};
use crate::inspect::is_default_domain;
use crate::proto::{AttributeProto, GraphProto, TensorProto, ValueInfoProto};

/// What [`optimize_graph`] folded or removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeStats {
    /// `Constant` and `Shape` nodes replaced by initializers.
    pub constants_folded: usize,
    pub identities_removed: usize,
    pub nodes_removed: usize,
    pub initializers_removed: usize,
}

impl OptimizeStats {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Folds `Constant` nodes and `Shape` nodes over statically shaped values
/// into initializers, then removes pass-through `Identity` nodes, nodes that
/// cannot reach a graph output, and initializers nothing reads. Subgraphs of
/// control-flow nodes count as readers of every outer value they mention.
pub fn optimize_graph(graph: &mut GraphProto) -> OptimizeStats {
    let stats = OptimizeStats {
        constants_folded: fold_constants(graph),
        identities_removed: eliminate_identities(graph),
        nodes_removed: eliminate_dead_nodes(graph),
        initializers_removed: prune_initializers(graph),
    };
    tracing::debug!(
        folded = stats.constants_folded,
        identities = stats.identities_removed,
        dead_nodes = stats.nodes_removed,
        initializers = stats.initializers_removed,
        "graph optimized"
    );
    stats
}

fn fold_constants(graph: &mut GraphProto) -> usize {
    let graph_outputs: HashSet<String> = graph.output.iter().map(|o| o.name.clone()).collect();
    let mut static_shapes: HashMap<String, Vec<i64>> = graph
        .initializer
        .iter()
        .map(|t| (t.name.clone(), t.dims.clone()))
        .collect();
    for input in &graph.input {
        if let Some(dims) = static_dims(input) {
            static_shapes.entry(input.name.clone()).or_insert(dims);
        }
    }

    let mut folded = Vec::new();
    let mut removed = vec![false; graph.node.len()];
    for (idx, node) in graph.node.iter().enumerate() {
        if !is_default_domain(&node.domain)
            || node.output.len() != 1
            || graph_outputs.contains(&node.output[0])
        {
            continue;
        }
        let output = &node.output[0];
        let tensor = match node.op_type.as_str() {
            "Constant" => constant_value(&node.attribute, output),
            "Shape" if node.input.len() == 1 && node.attribute.is_empty() => static_shapes
                .get(&node.input[0])
                .map(|dims| tensor_i64(output, &[dims.len() as i64], dims.clone())),
            _ => None,
        };
        if let Some(tensor) = tensor {
            static_shapes.insert(output.clone(), tensor.dims.clone());
            folded.push(tensor);
            removed[idx] = true;
        }
    }

    if folded.is_empty() {
        return 0;
    }
    let mut idx = 0;
    graph.node.retain(|_| {
        let keep = !removed[idx];
        idx += 1;
        keep
    });
    let count = folded.len();
    graph.initializer.extend(folded);
    count
}

/// The `value` tensor of a `Constant` node, renamed to its output.
fn constant_value(attrs: &[AttributeProto], output: &str) -> Option<TensorProto> {
    let [attr] = attrs else {
        return None;
    };
    if attr.name != "value" {
        return None;
    }
    let mut tensor = attr.t.clone()?;
    tensor.name = output.to_string();
    Some(tensor)
}

fn static_dims(info: &ValueInfoProto) -> Option<Vec<i64>> {
    let (_, dims) = tensor_type(info)?;
    dims?
        .into_iter()
        .map(|d| match d {
            Dim::Static(v) => Some(v),
            _ => None,
        })
        .collect()
}

fn eliminate_identities(graph: &mut GraphProto) -> usize {
    let graph_outputs: HashSet<&str> = graph.output.iter().map(|o| o.name.as_str()).collect();
    let mut forward: HashMap<String, String> = HashMap::new();
    let mut removed = vec![false; graph.node.len()];

    for (idx, node) in graph.node.iter().enumerate() {
        if node.op_type != "Identity"
            || !is_default_domain(&node.domain)
            || node.input.len() != 1
            || node.output.len() != 1
            || node.input[0].is_empty()
            || graph_outputs.contains(node.output[0].as_str())
        {
            continue;
        }
        forward.insert(node.output[0].clone(), node.input[0].clone());
        removed[idx] = true;
    }

    if forward.is_empty() {
        return 0;
    }

    let mut idx = 0;
    graph.node.retain(|_| {
        let keep = !removed[idx];
        idx += 1;
        keep
    });
    rename_uses(graph, &forward);
    forward.len()
}

/// Follows `forward` until a name no removed node produces.
fn resolve<'a>(forward: &'a HashMap<String, String>, mut name: &'a str) -> &'a str {
    while let Some(next) = forward.get(name) {
        name = next;
    }
    name
}

fn rename_uses(graph: &mut GraphProto, forward: &HashMap<String, String>) {
    for node in &mut graph.node {
        for input in &mut node.input {
            if forward.contains_key(input.as_str()) {
                *input = resolve(forward, input).to_string();
            }
        }
        for attr in &mut node.attribute {
            if let Some(sub) = attr.g.as_mut() {
                rename_subgraph(sub, forward);
            }
            for sub in &mut attr.graphs {
                rename_subgraph(sub, forward);
            }
        }
    }
}

fn rename_subgraph(graph: &mut GraphProto, forward: &HashMap<String, String>) {
    rename_uses(graph, forward);
    for output in &mut graph.output {
        if forward.contains_key(output.name.as_str()) {
            output.name = resolve(forward, &output.name).to_string();
        }
    }
}

fn eliminate_dead_nodes(graph: &mut GraphProto) -> usize {
    let mut live: HashSet<String> = graph.output.iter().map(|o| o.name.clone()).collect();
    let mut keep = vec![false; graph.node.len()];

    for (idx, node) in graph.node.iter().enumerate().rev() {
        if !node.output.iter().any(|o| live.contains(o)) {
            continue;
        }
        keep[idx] = true;
        live.extend(node.input.iter().filter(|i| !i.is_empty()).cloned());
        for attr in &node.attribute {
            for sub in attr.g.iter().chain(attr.graphs.iter()) {
                collect_reads(sub, &mut live);
            }
        }
    }

    let before = graph.node.len();
    let mut idx = 0;
    graph.node.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
    before - graph.node.len()
}

fn collect_reads(graph: &GraphProto, reads: &mut HashSet<String>) {
    for node in &graph.node {
        reads.extend(node.input.iter().filter(|i| !i.is_empty()).cloned());
        for attr in &node.attribute {
            for sub in attr.g.iter().chain(attr.graphs.iter()) {
                collect_reads(sub, reads);
            }
        }
    }
    reads.extend(graph.output.iter().map(|o| o.name.clone()));
}

fn prune_initializers(graph: &mut GraphProto) -> usize {
    let mut reads = HashSet::new();
    collect_reads(graph, &mut reads);

    let unused: HashSet<String> = graph
        .initializer
        .iter()
        .filter(|t| !reads.contains(&t.name))
        .map(|t| t.name.clone())
        .collect();
    if unused.is_empty() {
        return 0;
    }

    graph.initializer.retain(|t| !unused.contains(&t.name));
    graph.input.retain(|i| !unused.contains(&i.name));
    unused.len()
}
