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

#![allow(deprecated)]

use std::borrow::Cow;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    errors {
        IllegalState(desc: String) {
            description(desc)
            display("Illegal state: {}", desc)
        }

        IllegalArgument(desc: String) {
            description(desc)
            display("Illegal argument: {}", desc)
        }

        UnexpectedEOF(errmsg: String) {
            description(errmsg)
            display("Unexpected EOF: {}", errmsg)
        }

        CorruptIndex(errmsg: String) {
            description(errmsg)
            display("Corrupt Index: {}", errmsg)
        }

        UnsupportedOperation(errmsg: Cow<'static, str>) {
            description(errmsg),
            display("Unsupported Operation: {}", errmsg)
        }
    }

    foreign_links {
        FmtError(::std::fmt::Error);
        IoError(::std::io::Error);
        SerdeJsonError(::serde_json::Error);
    }
}

impl Error {
    /// Whether this error reports a structurally damaged index.
    pub fn is_corrupt_index(&self) -> bool {
        match self.kind() {
            ErrorKind::CorruptIndex(_) => true,
            _ => false,
        }
    }

    pub fn is_unsupported_operation(&self) -> bool {
        match self.kind() {
            ErrorKind::UnsupportedOperation(_) => true,
            _ => false,
        }
    }
}
