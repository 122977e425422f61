mod tables;

pub use self::tables::{
    catalog as print_catalog, evaluation as print_evaluation, history as print_history,
    stats as print_stats, strokes as print_strokes,
};
