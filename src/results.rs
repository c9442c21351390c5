mod batch;
mod row;

pub use batch::RowBatch;
pub use row::Row;
