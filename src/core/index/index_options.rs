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

/// What is recorded in the postings of an indexed field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOptions {
    Null,
    Docs,
    DocsAndFreqs,
    DocsAndFreqsAndPositions,
    DocsAndFreqsAndPositionsAndOffsets,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions::Null
    }
}

impl IndexOptions {
    pub fn has_freqs(self) -> bool {
        match self {
            IndexOptions::DocsAndFreqs => true,
            IndexOptions::DocsAndFreqsAndPositions => true,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => true,
            _ => false,
        }
    }

    pub fn has_positions(self) -> bool {
        match self {
            IndexOptions::DocsAndFreqsAndPositions => true,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => true,
            _ => false,
        }
    }

    pub fn has_offsets(self) -> bool {
        match self {
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets => true,
            _ => false,
        }
    }
}
