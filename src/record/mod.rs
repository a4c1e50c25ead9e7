/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The output record stream: data model (§4.E) and NDJSON codec (§4.F).

pub mod codec;
pub mod model;

pub use model::{FileType, PathField, Record, RecordBuilder, State, StatAttrs, XattrRecord};
