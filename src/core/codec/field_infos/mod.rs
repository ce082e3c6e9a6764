// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::core::index::IndexOptions;
use crate::error::ErrorKind::{IllegalArgument, IllegalState};
use crate::error::Result;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::result;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Describes one indexed field: its name, its number inside the segment and
/// which postings features it records. The terms dictionary consults it to
/// know whether frequencies and postings file pointers are present.
#[derive(Clone, Debug, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub number: u32,
    pub index_options: IndexOptions,
    pub has_store_payloads: bool,
}

impl FieldInfo {
    pub fn new(
        name: String,
        number: u32,
        index_options: IndexOptions,
        has_store_payloads: bool,
    ) -> Result<FieldInfo> {
        let info = FieldInfo {
            name,
            number,
            index_options,
            has_store_payloads,
        };
        info.check_consistency()?;
        Ok(info)
    }

    pub fn check_consistency(&self) -> Result<()> {
        if let IndexOptions::Null = self.index_options {
            if self.has_store_payloads {
                bail!(IllegalState(format!(
                    "Illegal State: non-indexed field '{}' cannot store payloads",
                    &self.name
                )));
            }
        } else if !self.index_options.has_positions() && self.has_store_payloads {
            bail!(IllegalState(format!(
                "Illegal State: indexed field '{}' cannot have payloads without positions",
                &self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

/// The fields of one segment, by number and by name.
#[derive(Debug)]
pub struct FieldInfos {
    pub has_freq: bool,
    pub has_prox: bool,
    pub has_payloads: bool,
    pub has_offsets: bool,

    pub by_number: BTreeMap<u32, Arc<FieldInfo>>,
    pub by_name: HashMap<String, Arc<FieldInfo>>,
}

impl Serialize for FieldInfos {
    fn serialize<S>(&self, serializer: S) -> result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("FieldInfos", 5)?;
        s.serialize_field("has_freq", &self.has_freq)?;
        s.serialize_field("has_prox", &self.has_prox)?;
        s.serialize_field("has_payloads", &self.has_payloads)?;
        s.serialize_field("has_offsets", &self.has_offsets)?;

        let fields: BTreeMap<&String, &FieldInfo> = self
            .by_name
            .iter()
            .map(|pair| (pair.0, pair.1.as_ref()))
            .collect();
        s.serialize_field("fields", &fields)?;
        s.end()
    }
}

impl fmt::Display for FieldInfos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Ok(s) = ::serde_json::to_string_pretty(self) {
            write!(f, "{}", s)?;
        }

        Ok(())
    }
}

impl FieldInfos {
    pub fn new(infos: Vec<FieldInfo>) -> Result<FieldInfos> {
        let mut has_prox = false;
        let mut has_payloads = false;
        let mut has_offsets = false;
        let mut has_freq = false;

        let mut by_number: BTreeMap<u32, Arc<FieldInfo>> = BTreeMap::new();
        let mut by_name: HashMap<String, Arc<FieldInfo>> = HashMap::new();

        for info in infos {
            info.check_consistency()?;
            let info = Arc::new(info);
            let number = info.number;

            has_prox |= info.index_options.has_positions();
            has_freq |= info.index_options.has_freqs();
            has_offsets |= info.index_options.has_offsets();
            has_payloads |= info.has_store_payloads;

            if let Some(previous) = by_number.insert(number, Arc::clone(&info)) {
                bail!(IllegalArgument(format!(
                    "Illegal Argument: duplicated field numbers: {} and {} have: {}",
                    previous.name, &info.name, number
                )));
            }

            let name = info.name.clone();
            if let Some(previous) = by_name.insert(name.clone(), info) {
                bail!(IllegalArgument(format!(
                    "Illegal Argument: duplicated field names: {} and {} have: {}",
                    previous.number, number, &name
                )));
            }
        }
        Ok(FieldInfos {
            has_freq,
            has_prox,
            has_payloads,
            has_offsets,
            by_number,
            by_name,
        })
    }

    pub fn field_info_by_number(&self, field_number: u32) -> Option<&FieldInfo> {
        self.by_number.get(&field_number).map(Arc::as_ref)
    }

    pub fn field_info_by_name(&self, field_name: &str) -> Option<&FieldInfo> {
        self.by_name.get(field_name).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
