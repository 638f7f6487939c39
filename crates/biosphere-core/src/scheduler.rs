//! Activation order: priority classes in configured order, shuffled within.

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::AgentId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    /// Agent classes in stepping order; empty means one shuffled pool.
    priorities: Vec<String>,
    /// Every scheduled agent with its class, in insertion order.
    agents: Vec<(AgentId, String)>,
    /// Agents grouped by priority class, built on first use.
    buckets: IndexMap<String, Vec<AgentId>>,
    grouped: bool,
    /// Steps handed out so far.
    steps: u64,
}

impl Scheduler {
    pub fn new(priorities: Vec<String>) -> Self {
        Self {
            priorities,
            ..Default::default()
        }
    }

    pub fn add(&mut self, id: AgentId, class: &str) {
        self.agents.push((id, class.to_string()));
        if self.grouped {
            if let Some(bucket) = self.buckets.get_mut(class) {
                bucket.push(id);
            }
        }
    }

    /// Drop an agent from the schedule and from its class bucket.
    pub fn remove(&mut self, id: AgentId) {
        self.agents.retain(|(a, _)| *a != id);
        for bucket in self.buckets.values_mut() {
            bucket.retain(|a| *a != id);
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn group(&mut self) {
        self.buckets = self
            .priorities
            .iter()
            .map(|class| (class.clone(), Vec::new()))
            .collect();
        for (id, class) in &self.agents {
            match self.buckets.get_mut(class) {
                Some(bucket) => bucket.push(*id),
                None => log::warn!("agent {id} of class '{class}' is not in the priority list and will not step"),
            }
        }
        self.grouped = true;
    }

    /// This step's activation order.
    pub fn order<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<AgentId> {
        self.steps += 1;
        if self.priorities.is_empty() {
            let mut all: Vec<AgentId> = self.agents.iter().map(|(id, _)| *id).collect();
            all.shuffle(rng);
            return all;
        }
        if !self.grouped {
            self.group();
        }
        let mut order = Vec::with_capacity(self.agents.len());
        for bucket in self.buckets.values_mut() {
            bucket.shuffle(rng);
            order.extend_from_slice(bucket);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scheduler() -> Scheduler {
        let mut s = Scheduler::new(vec!["structures".into(), "plants".into(), "humans".into()]);
        s.add(AgentId(1), "humans");
        s.add(AgentId(2), "plants");
        s.add(AgentId(3), "humans");
        s.add(AgentId(4), "structures");
        s.add(AgentId(5), "plants");
        s
    }

    #[test]
    fn test_priority_order() {
        let mut s = scheduler();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..10 {
            let order = s.order(&mut rng);
            assert_eq!(order[0], AgentId(4));
            let mut plants = order[1..3].to_vec();
            plants.sort();
            assert_eq!(plants, vec![AgentId(2), AgentId(5)]);
            let mut humans = order[3..].to_vec();
            humans.sort();
            assert_eq!(humans, vec![AgentId(1), AgentId(3)]);
        }
        assert_eq!(s.steps(), 10);
    }

    #[test]
    fn test_same_seed_same_order() {
        let run = || {
            let mut s = scheduler();
            let mut rng = ChaCha8Rng::seed_from_u64(42);
            (0..5).map(|_| s.order(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_unlisted_class_never_steps() {
        let mut s = scheduler();
        s.add(AgentId(6), "robots");
        let order = s.order(&mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(order.len(), 5);
        assert!(!order.contains(&AgentId(6)));
    }

    #[test]
    fn test_remove_purges_bucket() {
        let mut s = scheduler();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        s.order(&mut rng);
        s.remove(AgentId(3));
        let order = s.order(&mut rng);
        assert_eq!(order.len(), 4);
        assert!(!order.contains(&AgentId(3)));
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_no_priorities_shuffles_everyone() {
        let mut s = Scheduler::new(Vec::new());
        for i in 0..20 {
            s.add(AgentId(i), if i % 2 == 0 { "a" } else { "b" });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut order = s.order(&mut rng);
        assert_ne!(order, (0..20).map(AgentId).collect::<Vec<_>>());
        order.sort();
        assert_eq!(order, (0..20).map(AgentId).collect::<Vec<_>>());
    }
}
