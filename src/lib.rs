//! # csvhub
//!
//! A multi-tenant web application for uploading, browsing, editing and
//! visualizing CSV datasets, with team-based sharing and invitation-based
//! collaboration, built in Rust.
//!
//! ## Overview
//!
//! Users upload CSV files, page through and edit the rows, and analyze columns
//! through inferred statistics and charts. Datasets are private to their owner
//! until shared with a team; team members are recruited through emailed,
//! token-based invitations.
//!
//! ## Architecture
//!
//! The application follows a client-server architecture:
//!
//! ### Core Layer
//! - **Cell Values** - Tagged scalar union (string/number/boolean/null) behind
//!   every cell
//! - **Dataset Store** - In-memory dataset/row storage with stable row order
//!   and owner/team access control
//! - **Query Pipeline** - In-memory filter → stable sort → paginate over a
//!   dataset's rows
//! - **Summary Engine** - Per-column type inference (numeric/date/textual) and
//!   descriptive statistics over a bounded row sample
//! - **Chart Builder** - Histogram binning, sorted-value series and category
//!   counts, plus chart-kind selection rules
//!
//! ### Web Layer (feature `web`)
//! - **Technologies**: Rust, axum
//! - **Components**: session authentication (argon2 + cookie sessions), team
//!   and invitation management, SMTP notifications, JSON API for datasets and
//!   rows, server-side PNG chart rendering with plotters
//!
//! ### Data Persistence Layer
//! - JSON files for accounts, teams and invitations
//! - Gzip-compressed JSON snapshots per dataset under per-user directories
//!
//! ## Modules
//!
//! - **value**: the tagged cell scalar and its parsing/formatting rules
//! - **dataset**: dataset/column/row model, caller identity, in-memory store
//! - **query**: row filtering, sorting, pagination and single-cell edits
//! - **summary**: column type inference and sample statistics
//! - **chart**: chart-kind availability and aggregate series building
//! - **loader**: CSV text parsing (header row, quoted fields)
//! - **saving**: dataset snapshot persistence
//! - **error**: the error taxonomy shared by core and web layers
//! - **config**: environment-based configuration
//! - **login**: user accounts, sessions and authentication middleware
//! - **team**: teams, membership and invitations
//! - **mailer**: SMTP notifications (invitations, imports, password resets)
//! - **graph**: PNG rendering of prepared chart series
//! - **app**: routing and request handlers
//!
//! ## REST API Endpoints
//!
//! - `POST /api/csv/upload` - Import a CSV file
//! - `GET /api/csv` / `GET /api/csv/{id}` - List and inspect datasets
//! - `PATCH /api/csv/{id}` / `DELETE /api/csv/{id}` - Rename / delete
//! - `POST /api/csv/{id}/share` - Share with the caller's team
//! - `GET /api/csv/{id}/rows` - Filtered, sorted, paginated rows
//! - `PATCH /api/csv/{id}/rows` - Edit a single cell
//! - `GET /api/csv/{id}/summary` - Sampled column statistics
//! - `GET /api/csv/{id}/chart` / `chart.png` - Chart series and rendering
//! - `POST /api/auth/*` - Signup, login, logout, password reset
//! - `POST /api/team` / `POST /api/team/invite` - Team management

pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod query;
pub mod saving;
pub mod summary;
pub mod value;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod mailer;
#[cfg(feature = "web")]
pub mod team;

/// Re-export the core types to make the crate easier to use
pub use chart::{ChartKind, ChartPoint, available_chart_kinds, build_chart_data, select_chart_kind};
pub use dataset::{Caller, Column, Dataset, Row, Store};
pub use error::ApiError;
pub use query::{QueryOptions, RowPage, SortDirection, query_rows, update_cell};
pub use summary::{ColumnStats, ColumnType, summarize};
pub use value::CellValue;
