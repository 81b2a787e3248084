/// Модуль предобработки данных

pub mod cleaning;
pub mod column_transformer;
pub mod encoding;
pub mod feature_engineering;
pub mod normalization;
pub mod split;

pub use cleaning::DataCleaner;
pub use column_transformer::Preprocessor;
pub use encoding::OneHotEncoder;
pub use feature_engineering::FeatureEngineer;
pub use normalization::DataNormalizer;
pub use split::{prepare_data, train_test_indices, PreparedData};
