pub mod args;
pub mod error;
pub mod pipeline;
pub mod plot;
pub mod rank;
pub mod report;
pub mod table;
pub mod taxonomy;
pub mod utils;

pub use error::{AbundanceError, Result};
pub use rank::{Rank, RankCode};
pub use report::{ReportRecords, TaxonRecord};
pub use table::{AbundanceTable, Mode};
pub use taxonomy::{RankRollup, RollupOptions, TaxonomyTree};
