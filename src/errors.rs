
/// All the errors the phasing core can produce.
/// Everything except `ImpossibleGenotype` is fatal for the run that produced it.
#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum PhasingError {
    #[error("{what} capacity exceeded at position {position}: {observed} > {limit}")]
    CapacityExceeded { what: CapacityKind, position: u32, observed: usize, limit: usize },
    #[error("inconsistent pedigree at individual {individual}: {reason}")]
    PedigreeInconsistency { individual: u32, reason: String },
    #[error("no consistent genotype assignment at position {position} (column {column})")]
    ImpossibleGenotype { position: u32, column: usize },
    #[error("numeric underflow while computing {context}")]
    NumericUnderflow { context: String },
    #[error("numeric overflow while accumulating costs at position {position}")]
    NumericOverflow { position: u32 },
    #[error("read {read_name:?} belongs to sample {sample_id}, which is not in the pedigree")]
    UnknownIndividual { read_name: String, sample_id: u32 },
    #[error("invalid genotype input for individual {individual}: {reason}")]
    InvalidGenotype { individual: u32, reason: String },
    #[error("invalid genetic map: {reason}")]
    InvalidGeneticMap { reason: String }
}

/// Identifies which configured limit was hit
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display)]
pub enum CapacityKind {
    /// the number of reads simultaneously active in one column
    #[strum(serialize = "active read")]
    ActiveReads,
    /// the number of bits needed to enumerate the states of one column
    #[strum(serialize = "combinatorial width")]
    CombinatorialWidth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PhasingError::CapacityExceeded {
            what: CapacityKind::ActiveReads, position: 1000, observed: 25, limit: 20
        };
        assert_eq!(err.to_string(), "active read capacity exceeded at position 1000: 25 > 20");

        let err = PhasingError::ImpossibleGenotype { position: 55, column: 3 };
        assert_eq!(err.to_string(), "no consistent genotype assignment at position 55 (column 3)");
    }
}
