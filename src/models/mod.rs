/// ML модели

pub mod adaboost;
pub mod evaluation;
pub mod productivity;
pub mod regression_tree;

pub use adaboost::{AdaBoostConfig, AdaBoostRegressor};
pub use evaluation::{evaluate_model, RegressionMetrics};
pub use productivity::{train_model, ProductivityModel};
pub use regression_tree::RegressionTree;
