//! Transition counting and ergodic trimming.

use std::collections::{BTreeSet, HashMap};

use nalgebra::DMatrix;

/// Transition counts over the distinct labels of a label set.
#[derive(Debug, Clone)]
pub struct LabelCounts {
    /// Distinct labels, ascending; row/column `i` of `counts` is `labels[i]`.
    pub labels: Vec<usize>,
    pub counts: DMatrix<f64>,
}

/// Sliding-window counts at `lag`, divided by `lag`.
///
/// The matrix is `n × n` for the `n` distinct labels seen, whatever their values.
pub fn transition_counts(sequences: &[&[usize]], lag: usize) -> LabelCounts {
    let labels: Vec<usize> = sequences
        .iter()
        .flat_map(|s| s.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<usize, usize> = labels.iter().enumerate().map(|(i, &l)| (l, i)).collect();

    let n = labels.len();
    let mut counts = DMatrix::<f64>::zeros(n, n);
    for seq in sequences {
        for w in seq.windows(lag.saturating_add(1)) {
            counts[(index[&w[0]], index[&w[lag]])] += 1.0;
        }
    }
    LabelCounts {
        labels,
        counts: counts / lag as f64,
    }
}

/// Largest strongly connected component of the graph with an edge `i → j`
/// wherever `counts[(i, j)] >= cutoff` (and is positive).
///
/// Ties on size go to the component with more internal counts, then to the one
/// containing the smallest index. The result holds sorted matrix indices.
pub fn largest_connected_set(counts: &DMatrix<f64>, cutoff: f64) -> Vec<usize> {
    let n = counts.nrows();
    let adjacency: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| {
                    let c = counts[(i, j)];
                    c > 0.0 && c >= cutoff
                })
                .collect()
        })
        .collect();

    let mut best: Option<(Vec<usize>, f64)> = None;
    for mut component in strongly_connected_components(&adjacency) {
        component.sort_unstable();
        let weight = internal_counts(counts, &component);
        let better = match &best {
            None => true,
            Some((b, bw)) => {
                component.len() > b.len()
                    || (component.len() == b.len() && weight > *bw)
                    || (component.len() == b.len() && weight == *bw && component[0] < b[0])
            }
        };
        if better {
            best = Some((component, weight));
        }
    }
    best.map(|(c, _)| c).unwrap_or_default()
}

/// Sum of counts between members of `set` (self-transitions included).
pub fn internal_counts(counts: &DMatrix<f64>, set: &[usize]) -> f64 {
    set.iter()
        .flat_map(|&i| set.iter().map(move |&j| (i, j)))
        .map(|ij| counts[ij])
        .sum()
}

/// Restrict `counts` to the rows and columns in `set`, in that order.
pub fn submatrix(counts: &DMatrix<f64>, set: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(set.len(), set.len(), |a, b| counts[(set[a], set[b])])
}

/// Iterative Tarjan over nodes `0..adjacency.len()`.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        // (node, position of the next neighbour to visit)
        let mut call: Vec<(usize, usize)> = vec![(root, 0)];
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(top) = call.last_mut() {
            let v = top.0;
            if let Some(&w) = adjacency[v].get(top.1) {
                top.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call.pop();
            if let Some(&(parent, _)) = call.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}
