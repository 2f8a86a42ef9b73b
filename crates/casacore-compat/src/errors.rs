use std::path::PathBuf;

use casa_engine::EngineError;
use thiserror::Error;

/// All errors that can occur in the casacore-compat crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine rejected an operation. `context` names what was being
    /// accessed (table, column, row range).
    #[error("{context}: {source}")]
    Engine {
        context: String,
        #[source]
        source: EngineError,
    },
    /// Query text failed to execute.
    #[error("query failed: {query}: {source}")]
    Query {
        query: String,
        #[source]
        source: EngineError,
    },
    /// A view or facade was used after its owning handle was closed.
    #[error("{name} is not open")]
    ClosedHandle { name: String },
    /// A temporary query copy could not be removed after the query succeeded.
    #[error("failed to remove temporary table copy {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: EngineError,
    },
    /// Engine metadata without the structure the facade expects.
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    /// Arguments the facade cannot translate.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience result type for the compat crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach context to engine results.
pub trait ResultExt<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> ResultExt<T> for casa_engine::Result<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::Engine {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_with_context() {
        let r: casa_engine::Result<()> = Err(EngineError::NoSuchColumn("FLAG".into()));
        let e = r.context(|| "reading column FLAG of vis.ms".into()).unwrap_err();
        assert!(matches!(e, Error::Engine { .. }));
        assert_eq!(
            e.to_string(),
            "reading column FLAG of vis.ms: unknown column: FLAG"
        );
    }

    #[test]
    fn display_query_error() {
        let e = Error::Query {
            query: "SELECT * FROM t".into(),
            source: EngineError::Query("unknown table t".into()),
        };
        assert_eq!(
            e.to_string(),
            "query failed: SELECT * FROM t: cannot execute query: unknown table t"
        );
    }

    #[test]
    fn display_closed_handle() {
        let e = Error::ClosedHandle {
            name: "vis.ms".into(),
        };
        assert_eq!(e.to_string(), "vis.ms is not open");
    }

    #[test]
    fn error_source() {
        use std::error::Error as StdError;

        let e = Error::MalformedRecord("perplanebeams".into());
        assert!(e.source().is_none());

        let e = Error::Cleanup {
            path: PathBuf::from("/tmp/t_copy"),
            source: EngineError::from(std::io::Error::other("busy")),
        };
        assert!(e.source().is_some());
    }
}
