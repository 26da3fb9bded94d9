// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Skeleton of iterative optimization algorithms.

/// Returned by `stop_criterion` to tell if iterations should go on.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Continue {
    /// Stop iterations.
    Stop,
    /// Do one more iteration.
    Forward,
}

/// State of an iterative optimizer, minimizing an energy
/// computed from observations `Obs`.
///
/// * `Model`: what is optimized (a rigid motion for tracking).
/// * `EvalState`: result of a model evaluation. It may be only partially
///   computed, for example when the energy increased and the step is rejected.
/// * `Error`: reason of a failed step computation.
pub trait OptimizerState<Obs>: Sized {
    type Model;
    type EvalState;
    type Error;

    /// Initialize the optimizer state from a first model.
    fn init(obs: &Obs, model: Self::Model) -> Result<Self, Self::Error>;

    /// Compute the next model to evaluate.
    fn step(&self) -> Result<Self::Model, Self::Error>;

    /// Evaluate a new model.
    fn eval(&self, obs: &Obs, new_model: Self::Model) -> Self::EvalState;

    /// Decide if iterations should continue,
    /// and return the state kept for the next iteration.
    fn stop_criterion(self, nb_iter: usize, eval_state: Self::EvalState) -> (Self, Continue);

    /// Iterate until `stop_criterion` says stop, or a step fails.
    /// Returns the final state and the number of iterations.
    fn iterative_solve(obs: &Obs, initial_model: Self::Model) -> Result<(Self, usize), Self::Error> {
        let mut state = Self::init(obs, initial_model)?;
        let mut nb_iter = 0;
        loop {
            nb_iter += 1;
            let new_model = state.step()?;
            let eval_state = state.eval(obs, new_model);
            let (kept_state, continuation) = state.stop_criterion(nb_iter, eval_state);
            state = kept_state;
            if continuation == Continue::Stop {
                return Ok((state, nb_iter));
            }
        }
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    /// Gradient descent on `(x - target)^2` with a fixed step.
    struct Descent {
        x: f32,
        energy: f32,
    }

    impl OptimizerState<f32> for Descent {
        type Model = f32;
        type EvalState = Descent;
        type Error = String;

        fn init(target: &f32, x: f32) -> Result<Self, String> {
            Ok(Self {
                x,
                energy: (x - target).powi(2),
            })
        }

        fn step(&self) -> Result<f32, String> {
            if self.energy.is_finite() {
                // Half way to the minimum of the parabola.
                Ok(self.x - 0.5 * self.x.signum() * self.energy.sqrt())
            } else {
                Err("diverged".to_string())
            }
        }

        fn eval(&self, target: &f32, x: f32) -> Descent {
            Descent {
                x,
                energy: (x - target).powi(2),
            }
        }

        fn stop_criterion(self, nb_iter: usize, new_state: Descent) -> (Self, Continue) {
            if nb_iter >= 10 || new_state.energy < 1e-6 {
                (new_state, Continue::Stop)
            } else {
                (new_state, Continue::Forward)
            }
        }
    }

    #[test]
    fn iterations_stop_on_criterion() {
        let (state, nb_iter) = Descent::iterative_solve(&0.0, 8.0).unwrap();
        assert_eq!(10, nb_iter);
        assert!(state.energy < 1e-3);
    }

    #[test]
    fn step_errors_are_propagated() {
        let result = Descent::iterative_solve(&0.0, std::f32::INFINITY);
        assert_eq!(Some("diverged".to_string()), result.err());
    }
}
