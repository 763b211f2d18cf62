// scenarize_convert/src/oracle.rs

//! Route existence over the lanelet graph.
//!
//! A breadth-first search over successor and adjacency edges, counting from
//! how many of the initial state's lanelets the goal region can be reached.
//! Deliberately conservative: it answers "is there any route", not "which
//! route is best".

use std::collections::{HashSet, VecDeque};

use scenarize_core::pipeline::RouteOracle;
use scenarize_core::planning::PlanningProblem;
use scenarize_core::prototype::ScenarioPrototype;
use scenarize_core::scene::{LaneletId, StaticScene};

#[derive(Debug, Default, Clone, Copy)]
pub struct LaneletGraphOracle;

impl LaneletGraphOracle {
    fn reachable(scene: &StaticScene, start: LaneletId, goals: &HashSet<LaneletId>) -> bool {
        let mut visited: HashSet<LaneletId> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if goals.contains(&current) {
                return true;
            }
            let Some(lanelet) = scene.lanelet(current) else {
                continue;
            };
            let neighbors = lanelet
                .successors
                .iter()
                .copied()
                .chain(lanelet.adjacent_left)
                .chain(lanelet.adjacent_right);
            for next in neighbors {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

impl RouteOracle for LaneletGraphOracle {
    fn count_routes(&self, prototype: &ScenarioPrototype, problem: &PlanningProblem) -> usize {
        let scene = &prototype.scene;
        let starts = scene.find_lanelets_at(problem.initial_state.position);
        let goals: HashSet<LaneletId> = scene
            .find_lanelets_at(problem.goal.position.reference_point())
            .into_iter()
            .collect();
        if goals.is_empty() {
            return 0;
        }
        starts
            .into_iter()
            .filter(|start| Self::reachable(scene, *start, &goals))
            .count()
    }
}
