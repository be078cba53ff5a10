//! Episode generation under a behavior policy

use rand::Rng;
use serde::{Deserialize, Serialize};

use tabula_core::{Environment, Episode, Result, Step, TabulaError};

use crate::policy::Policy;

/// Drives an environment under a policy until termination.
///
/// With `max_steps` set, an episode that has not terminated after that many
/// steps fails with [`TabulaError::EpisodeTimeout`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryGenerator {
    pub max_steps: Option<usize>,
}

impl TrajectoryGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            max_steps: Some(max_steps),
        }
    }

    /// Fail once `steps` transitions have been taken without terminating
    pub fn check(&self, steps: usize) -> Result<()> {
        match self.max_steps {
            Some(max) if steps >= max => Err(TabulaError::EpisodeTimeout { steps }),
            _ => Ok(()),
        }
    }

    pub fn generate<E, R>(
        &self,
        env: &mut E,
        policy: &Policy<E::State, E::Action>,
        rng: &mut R,
    ) -> Result<Episode<E::State, E::Action>>
    where
        E: Environment,
        R: Rng + ?Sized,
    {
        let mut episode = Episode::new();
        let mut state = env.reset();
        loop {
            let action = policy.sample(&state, rng)?;
            let transition = env.step(&state, action)?;
            let next = transition.next_state;
            episode.push(Step::new(state, action, transition.reward));
            match next {
                Some(next) => {
                    self.check(episode.len())?;
                    state = next;
                }
                None => return Ok(episode),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tabula_core::{DiscreteAction, Transition};

    /// Walks right along a line of `len` cells; the last cell is terminal
    struct Line {
        len: u32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Dir {
        Left,
        Right,
    }

    impl DiscreteAction for Dir {
        const ALL: &'static [Self] = &[Dir::Left, Dir::Right];

        fn to_index(self) -> usize {
            self as usize
        }
    }

    impl Environment for Line {
        type State = u32;
        type Action = Dir;

        fn name(&self) -> &str {
            "line"
        }

        fn reset(&mut self) -> u32 {
            0
        }

        fn step(&mut self, state: &u32, action: Dir) -> Result<Transition<u32>> {
            let next = match action {
                Dir::Left => state.saturating_sub(1),
                Dir::Right => state + 1,
            };
            if next + 1 == self.len {
                Ok(Transition::terminal(1.0))
            } else {
                Ok(Transition::to(next, 0.0))
            }
        }
    }

    #[test]
    fn test_generate_until_terminal() {
        let mut env = Line { len: 5 };
        let policy = Policy::always(Dir::Right);
        let mut rng = StdRng::seed_from_u64(0);
        let episode = TrajectoryGenerator::new()
            .generate(&mut env, &policy, &mut rng)
            .unwrap();

        let states: Vec<u32> = episode.iter().map(|step| step.state).collect();
        assert_eq!(states, vec![0, 1, 2, 3]);
        assert_eq!(episode.terminal_reward(), Some(1.0));
    }

    #[test]
    fn test_step_cap_times_out() {
        let mut env = Line { len: 5 };
        let policy = Policy::always(Dir::Left);
        let mut rng = StdRng::seed_from_u64(0);
        let err = TrajectoryGenerator::with_max_steps(50)
            .generate(&mut env, &policy, &mut rng)
            .unwrap_err();
        assert!(matches!(err, TabulaError::EpisodeTimeout { steps: 50 }));
    }

    #[test]
    fn test_cap_not_hit_by_terminating_episode() {
        let mut env = Line { len: 5 };
        let policy = Policy::always(Dir::Right);
        let mut rng = StdRng::seed_from_u64(0);
        let episode = TrajectoryGenerator::with_max_steps(4)
            .generate(&mut env, &policy, &mut rng)
            .unwrap();
        assert_eq!(episode.len(), 4);
    }
}
