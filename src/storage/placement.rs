//! Chunk Placement
//!
//! Round-robin assignment of chunk indices to nodes. The node list is
//! captured once per upload and sorted, so a given set of node names always
//! produces the same assignment regardless of registry iteration order.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPlan {
    nodes: Vec<String>,
}

impl PlacementPlan {
    pub fn new(mut nodes: Vec<String>) -> Self {
        nodes.sort();
        nodes.dedup();
        Self { nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Node owning chunk `index`: `index mod N` over the sorted names.
    pub fn node_for(&self, index: u32) -> Option<&str> {
        if self.nodes.is_empty() {
            return None;
        }
        let idx = (index as usize) % self.nodes.len();
        Some(self.nodes[idx].as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_plan_has_no_owner() {
        let plan = PlacementPlan::new(vec![]);
        assert!(plan.is_empty());
        assert_eq!(plan.node_for(0), None);
    }

    #[test]
    fn test_round_robin_over_sorted_names() {
        let plan = PlacementPlan::new(names(&["node-c", "node-a", "node-b"]));
        assert_eq!(plan.nodes(), &names(&["node-a", "node-b", "node-c"])[..]);

        let owners: Vec<&str> = (0..7).filter_map(|i| plan.node_for(i)).collect();
        assert_eq!(
            owners,
            vec!["node-a", "node-b", "node-c", "node-a", "node-b", "node-c", "node-a"]
        );
    }

    #[test]
    fn test_plan_ignores_input_order() {
        let p1 = PlacementPlan::new(names(&["x", "y", "z"]));
        let p2 = PlacementPlan::new(names(&["z", "x", "y"]));
        for i in 0..100 {
            assert_eq!(p1.node_for(i), p2.node_for(i));
        }
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let plan = PlacementPlan::new(names(&["a", "a", "b"]));
        assert_eq!(plan.len(), 2);
    }
}
