//! Query/Filter engine.
//!
//! Raw query parameters arrive as optional strings (straight from a query
//! string). They are resolved **once** into a single [`Filter`] and a
//! [`Pagination`]. Filters are never combined: when several dimensions are
//! supplied the highest-priority one wins:
//!
//! ```text
//! transferId > type > status > user > date range > none
//! ```
//!
//! Empty strings count as absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use treasury_types::{
    Address, Operation, OperationStatus, OperationType, PassId, Result, TransferId,
    TreasuryError, constants,
};

use crate::OperationStore;

/// Exactly one filter dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    ByTransferId(TransferId),
    ByType(OperationType),
    ByStatus(OperationStatus),
    /// Matches operations where the address is the user or the counterparty.
    ByUser(Address),
    /// `from` inclusive, `to` exclusive; either bound may be open.
    ByDateRange {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    None,
}

impl Filter {
    #[must_use]
    pub fn matches(&self, op: &Operation) -> bool {
        match self {
            Self::ByTransferId(id) => op.transfer_id == *id,
            Self::ByType(t) => op.op_type == *t,
            Self::ByStatus(s) => op.status == *s,
            Self::ByUser(addr) => op.user == *addr || op.counterparty == Some(*addr),
            Self::ByDateRange { from, to } => {
                from.is_none_or(|f| op.date >= f) && to.is_none_or(|t| op.date < t)
            }
            Self::None => true,
        }
    }

    /// Position in the priority order (0 = highest).
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::ByTransferId(_) => 0,
            Self::ByType(_) => 1,
            Self::ByStatus(_) => 2,
            Self::ByUser(_) => 3,
            Self::ByDateRange { .. } => 4,
            Self::None => 5,
        }
    }
}

/// What a store scan selects. Public queries always use [`Selection::Filter`];
/// the clearing engine and pass bookkeeping use the other two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Filter(Filter),
    /// Open obligations the clearing engine may net.
    OpenObligations,
    /// Everything emitted or claimed by one clearing pass.
    Pass(PassId),
}

impl Selection {
    #[must_use]
    pub fn matches(&self, op: &Operation) -> bool {
        match self {
            Self::Filter(filter) => filter.matches(op),
            Self::OpenObligations => op.is_clearable(),
            Self::Pass(pass) => op.clearing_pass == Some(*pass),
        }
    }
}

impl From<Filter> for Selection {
    fn from(filter: Filter) -> Self {
        Self::Filter(filter)
    }
}

/// Offset/limit window handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    /// No offset, no limit.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }
}

/// Resolved pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub page: usize,
    /// Records per page; `None` means no pagination.
    pub page_size: Option<usize>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: constants::DEFAULT_PAGE,
            page_size: None,
        }
    }
}

impl Pagination {
    /// `offset = (page - 1) * page_size`, `limit = page_size`; without a page
    /// size the whole result set is returned from the start.
    #[must_use]
    pub fn window(&self) -> Window {
        match self.page_size {
            Some(size) => Window {
                offset: self.page.saturating_sub(1).saturating_mul(size),
                limit: Some(size),
            },
            None => Window::all(),
        }
    }
}

/// Raw `listOperations` parameters as received from the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationQuery {
    #[serde(rename = "transferId", default)]
    pub transfer_id: Option<String>,
    #[serde(rename = "type", default)]
    pub op_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub fromdate: Option<String>,
    #[serde(default)]
    pub todate: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub page_size: Option<String>,
}

fn present(raw: Option<&String>) -> Option<&str> {
    raw.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_date(raw: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| TreasuryError::InvalidFilter {
            reason: format!("{field} '{raw}' is not an RFC 3339 date: {e}"),
        })
}

impl OperationQuery {
    /// Resolve the single filter to apply, by priority.
    pub fn filter(&self) -> Result<Filter> {
        if let Some(raw) = present(self.transfer_id.as_ref()) {
            let id = raw.parse::<TransferId>().map_err(|_| TreasuryError::InvalidFilter {
                reason: format!("transferId '{raw}' is not a valid UUID"),
            })?;
            return Ok(Filter::ByTransferId(id));
        }
        if let Some(raw) = present(self.op_type.as_ref()) {
            return Ok(Filter::ByType(raw.parse()?));
        }
        if let Some(raw) = present(self.status.as_ref()) {
            return Ok(Filter::ByStatus(raw.parse()?));
        }
        if let Some(raw) = present(self.user.as_ref()) {
            let addr = raw.parse::<Address>().map_err(|_| TreasuryError::InvalidFilter {
                reason: format!("user '{raw}' is not a valid address"),
            })?;
            return Ok(Filter::ByUser(addr));
        }
        let from = present(self.fromdate.as_ref());
        let to = present(self.todate.as_ref());
        if from.is_some() || to.is_some() {
            return Ok(Filter::ByDateRange {
                from: from.map(|f| parse_date(f, "fromdate")).transpose()?,
                to: to.map(|t| parse_date(t, "todate")).transpose()?,
            });
        }
        Ok(Filter::None)
    }

    /// Resolve pagination. Never fails: unusable values mean "no pagination"
    /// for `page_size` and "first page" for `page`.
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        let page_size = present(self.page_size.as_ref())
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0);
        let page = present(self.page.as_ref())
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(constants::DEFAULT_PAGE)
            .max(1);
        Pagination { page, page_size }
    }

    pub fn resolve(&self) -> Result<(Filter, Pagination)> {
        Ok((self.filter()?, self.pagination()))
    }
}

/// `listOperations` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPage {
    pub page: usize,
    /// Number of operations in this page.
    pub page_size: usize,
    pub operations: Vec<Operation>,
}

/// Run a raw query against a store.
pub async fn list_operations<S>(store: &S, query: &OperationQuery) -> Result<OperationPage>
where
    S: OperationStore + ?Sized,
{
    let (filter, pagination) = query.resolve()?;
    tracing::debug!(
        ?filter,
        priority = filter.priority(),
        page = pagination.page,
        page_size = ?pagination.page_size,
        "listing operations"
    );
    let operations = store
        .scan(&Selection::Filter(filter), pagination.window())
        .await?;
    Ok(OperationPage {
        page: pagination.page,
        page_size: operations.len(),
        operations,
    })
}
