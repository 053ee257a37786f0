//! Constraint equations, the Gauss-Seidel solver, and time integration.

pub mod contact;
pub mod equation;
pub mod friction;
pub mod integrator;
pub mod rotational;
pub mod solver;

pub use contact::ContactEquation;
pub use equation::{Equation, SolverEquation};
pub use friction::FrictionEquation;
pub use integrator::Integrator;
pub use rotational::{AngleLockEquation, RotationalLockEquation, RotationalVelocityEquation};
pub use solver::{EquationRows, GsSolver, StepRows};
