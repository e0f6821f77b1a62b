//! Definition of the network module.
//!
//! An `EdgeSet` is a pure-topology directed graph over a fixed range of
//! node indices; a `Network` pairs one with the variable list it is
//! defined over and adds the structural queries (acyclicity, random
//! generation) the evaluators need. An `EdgeSet` does not police cycles or
//! self-loops itself; committed networks are kept acyclic by the
//! evaluators that mutate them.

use dataset::Variable;

use ndarray::prelude as nd;
use ndarray_rand::RandomExt;
use rand::distributions::Range;

use std::rc::Rc;


/// A directed edge `(source, destination)` between two node indices.
pub type Edge = (usize, usize);


/// A mutable set of directed edges over nodes `0..N-1`.
///
/// Both directions of every adjacency are stored, as sorted lists:
/// `j ∈ outgoing(i) ⟺ i ∈ incoming(j)` holds after every operation.
/// Cloning deep-copies the adjacency lists, which is what the evaluators'
/// snapshot/undo machinery relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeSet {
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    num_edges: usize
}

impl EdgeSet {

    /// Construct an empty `EdgeSet` over `num_nodes` nodes. The node count
    /// is fixed for the lifetime of the set.
    pub fn new(num_nodes: usize) -> EdgeSet {
        EdgeSet {
            outgoing: vec![Vec::new(); num_nodes],
            incoming: vec![Vec::new(); num_nodes],
            num_edges: 0
        }
    }

    /// The fixed node count.
    pub fn num_nodes(&self) -> usize {
        self.outgoing.len()
    }

    /// The number of edges currently in the set.
    pub fn len(&self) -> usize {
        self.num_edges
    }

    /// Whether the set contains no edges.
    pub fn is_empty(&self) -> bool {
        self.num_edges == 0
    }

    /// Insert an edge. Adding an edge that is already present is a no-op;
    /// this operation has no failure mode.
    pub fn add(&mut self, edge: Edge) {
        let (src, dst) = edge;
        if let Err(pos) = self.outgoing[src].binary_search(&dst) {
            self.outgoing[src].insert(pos, dst);
            let pos = self.incoming[dst].binary_search(&src).unwrap_err();
            self.incoming[dst].insert(pos, src);
            self.num_edges += 1;
        }
    }

    /// Insert every edge in `edges`.
    pub fn add_many(&mut self, edges: &[Edge]) {
        for &edge in edges {
            self.add(edge);
        }
    }

    /// Delete an edge. Removing an edge that is not present silently
    /// succeeds.
    pub fn remove(&mut self, edge: Edge) {
        let (src, dst) = edge;
        if src >= self.num_nodes() || dst >= self.num_nodes() {
            return;
        }

        if let Ok(pos) = self.outgoing[src].binary_search(&dst) {
            self.outgoing[src].remove(pos);
            let pos = self.incoming[dst].binary_search(&src).unwrap();
            self.incoming[dst].remove(pos);
            self.num_edges -= 1;
        }
    }

    /// Delete every edge in `edges`.
    pub fn remove_many(&mut self, edges: &[Edge]) {
        for &edge in edges {
            self.remove(edge);
        }
    }

    /// Remove all edges, preserving the node count.
    pub fn clear(&mut self) {
        for list in self.outgoing.iter_mut() {
            list.clear();
        }
        for list in self.incoming.iter_mut() {
            list.clear();
        }
        self.num_edges = 0;
    }

    /// Membership test. Out-of-range indices are simply absent, never an
    /// error.
    pub fn contains(&self, edge: &Edge) -> bool {
        let (src, dst) = *edge;
        src < self.num_nodes() && self.outgoing[src].binary_search(&dst).is_ok()
    }

    /// The sorted list of nodes `j` such that `node → j` exists.
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[node]
    }

    /// The sorted list of nodes `i` such that `i → node` exists.
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[node]
    }

    /// Alias for `incoming`: the parents of `node`.
    pub fn parents(&self, node: usize) -> &[usize] {
        self.incoming(node)
    }

    /// Alias for `outgoing`: the children of `node`.
    pub fn children(&self, node: usize) -> &[usize] {
        self.outgoing(node)
    }

    /// All edges in lexicographic `(src, dst)` order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut all = Vec::with_capacity(self.num_edges);
        for (src, dsts) in self.outgoing.iter().enumerate() {
            for &dst in dsts {
                all.push((src, dst));
            }
        }
        all
    }

    /// Convert to a dense `N×N` boolean adjacency matrix.
    pub fn adjacency_matrix(&self) -> nd::Array2<bool> {
        let n = self.num_nodes();
        let mut matrix = nd::Array2::from_elem((n, n), false);
        for (src, dst) in self.edges() {
            matrix[[src, dst]] = true;
        }
        matrix
    }

    /// Replace all edges with those of a dense adjacency matrix.
    pub fn set_adjacency_matrix(&mut self, matrix: &nd::Array2<bool>) {
        let n = self.num_nodes();
        assert_eq!((n, n), matrix.dim());

        self.clear();
        for src in 0..n {
            for dst in 0..n {
                if matrix[[src, dst]] {
                    self.add((src, dst));
                }
            }
        }
    }
}


/// A node list paired with an `EdgeSet`.
///
/// The variable list is shared read-only (it belongs to the `Dataset`);
/// cloning a `Network` deep-copies only the edges.
#[derive(Clone, Debug)]
pub struct Network {
    nodes: Rc<Vec<Variable>>,
    edges: EdgeSet
}

impl Network {

    /// Construct an edgeless `Network` over the given variables.
    pub fn new(nodes: Rc<Vec<Variable>>) -> Network {
        let n = nodes.len();
        Network { nodes, edges: EdgeSet::new(n) }
    }

    /// Construct a `Network` with the given initial edges.
    pub fn with_edges(nodes: Rc<Vec<Variable>>, edges: &[Edge]) -> Network {
        let mut net = Network::new(nodes);
        net.edges.add_many(edges);
        net
    }

    /// Generate a random directed acyclic graph over the given variables.
    ///
    /// Samples an adjacency matrix at `density` (default `1/n`), strips
    /// self-loops and checks acyclicity; on failure retries with halved
    /// density, and after a bounded number of attempts falls back to the
    /// empty (trivially acyclic) graph.
    pub fn random(nodes: Rc<Vec<Variable>>, density: Option<f64>) -> Network {
        Network::random_with_constraints(nodes, density, &[], &[])
    }

    /// Generate a random DAG, forcing `required` edges present and
    /// `prohibited` edges absent in every attempt.
    pub fn random_with_constraints(
        nodes: Rc<Vec<Variable>>,
        density: Option<f64>,
        required: &[Edge],
        prohibited: &[Edge],
    ) -> Network {
        let n = nodes.len();
        let mut density = density.unwrap_or(1.0 / n as f64);
        let max_attempts = 50;

        for _ in 0..max_attempts {
            let draws = nd::Array::random((n, n), Range::new(0.0, 1.0));

            let mut matrix = nd::Array2::from_elem((n, n), false);
            for src in 0..n {
                for dst in 0..n {
                    matrix[[src, dst]] = src != dst && draws[[src, dst]] < density;
                }
            }
            for &(src, dst) in required {
                matrix[[src, dst]] = true;
            }
            for &(src, dst) in prohibited {
                matrix[[src, dst]] = false;
            }

            let mut net = Network::new(nodes.clone());
            net.edges.set_adjacency_matrix(&matrix);
            if net.is_acyclic(None) {
                return net;
            }

            density /= 2.0;
        }

        Network::new(nodes)
    }

    /// The shared variable list.
    pub fn nodes(&self) -> &Rc<Vec<Variable>> {
        &self.nodes
    }

    /// The number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The edge set.
    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    /// The edge set, mutably. Callers editing through this must re-check
    /// acyclicity before treating the network as committed.
    pub fn edges_mut(&mut self) -> &mut EdgeSet {
        &mut self.edges
    }

    /// Test whether the graph restricted to paths reachable from `roots`
    /// is free of directed cycles.
    ///
    /// Classic white/gray/black depth-first search: a node revisited while
    /// still on the current path is a cycle, including the length-1 cycle
    /// of a self-loop. With `roots = None` every node is a root and the
    /// whole graph is checked. A new cycle must pass through the
    /// destination of some newly added edge, so callers probing a
    /// tentative edit pass just those destinations — far cheaper than a
    /// full-graph check.
    pub fn is_acyclic(&self, roots: Option<&[usize]>) -> bool {
        let n = self.num_nodes();
        let mut color = vec![0u8; n];

        match roots {
            Some(roots) => {
                roots.iter().all(|&r| color[r] != 0 || visit(&self.edges, r, &mut color))
            },
            None => {
                (0..n).all(|r| color[r] != 0 || visit(&self.edges, r, &mut color))
            }
        }
    }
}

/// DFS from `node`; 0 = unvisited, 1 = on the current path, 2 = done.
/// Returns false as soon as a path node is re-entered.
fn visit(edges: &EdgeSet, node: usize, color: &mut [u8]) -> bool {
    color[node] = 1;
    for &child in edges.outgoing(node) {
        match color[child] {
            1 => return false,
            0 => {
                if !visit(edges, child, color) {
                    return false;
                }
            },
            _ => ()
        }
    }
    color[node] = 2;
    true
}
