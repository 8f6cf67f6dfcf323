/*!
 * Batch splitting.
 *
 * Partitions a job's ordered lines into contiguous fixed-size batches. Batch
 * `i` holds lines `[i * size, min((i + 1) * size, len))` in original order.
 */

use crate::errors::JobError;
use crate::jobs::models::Line;

/// A contiguous slice of a job's lines sent in one API call
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position of the batch in the job, starting at 0
    pub number: usize,
    /// Lines of the batch, in original order
    pub lines: Vec<Line>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Split `lines` into batches of at most `batch_size` lines
pub fn split_batches(lines: &[Line], batch_size: usize) -> Result<Vec<Batch>, JobError> {
    if batch_size == 0 {
        return Err(JobError::Validation("batchSize must be at least 1".to_string()));
    }

    Ok(lines
        .chunks(batch_size)
        .enumerate()
        .map(|(number, chunk)| Batch {
            number,
            lines: chunk.to_vec(),
        })
        .collect())
}
