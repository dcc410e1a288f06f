//! Mineset – an identifier-indexed store of items kept in several ordered
//! lists at once, with provenance tracks and a small rule engine that runs
//! pipelines of actions over item ids.
//!
//! Items are owned once, by id, and lists (containers) only hold ids. A
//! reverse index maps every id to its position in every container holding
//! it, so membership questions never scan containers.
//!
//! ## Modules
//! * [`construct`] – Identifier generation, the [`construct::Item`] contract,
//!   the item keeper and the reverse position index.
//! * [`datatype`] – [`datatype::FieldValue`], the totally ordered value items
//!   hand out for named fields.
//! * [`container`] – Ordered lists of ids, their provenance and sorting.
//! * [`content`] – [`content::ContentCollection`], which keeps items,
//!   containers and the index consistent.
//! * [`track`] – Provenance tracks and the tracked collection.
//! * [`action`] – Actions, the predicates and transforms they call, and the
//!   registry resolving declarative actions.
//! * [`batch`] – The [`batch::Batch`] engine running action pipelines.
//! * [`stored`] – Source-keyed containers, the cut/paste buffer and history.
//! * [`record`] – A general purpose item made of named fields.
//! * [`settings`] – Layered configuration.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use mineset::action::{Action, ActionKind};
//! use mineset::batch::{Batch, BatchCollection, IdSource};
//! use mineset::record::{Comparison, FieldTest, Record};
//!
//! let mut batch: BatchCollection<Record> = BatchCollection::new();
//! for (uid, score) in [(0, 3), (1, 8), (2, 6)] {
//!     batch.add_item(Record::new(uid).with("score", score), None, None);
//! }
//! let high = Action::<Record>::new(ActionKind::FilterSingle)
//!     .block("high", Arc::new(FieldTest::against_value("score", Comparison::Ge, 5)));
//! let ids = batch.do_actions(&[high], &IdSource::All, None, false, None).unwrap();
//! assert_eq!(ids, vec![1, 2]);
//! ```
pub mod action;
pub mod batch;
pub mod construct;
pub mod container;
pub mod content;
pub mod datatype;
pub mod error;
pub mod record;
pub mod settings;
pub mod stored;
pub mod track;

pub use error::{MinesetError, Result};
