// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Caller-supplied payload serialization.
//!
//! The queue stores opaque text. A [`PayloadCodec`] turns caller items into
//! that text and back; the queue never inspects it beyond reserved bytes.

use std::{fmt, marker::PhantomData};

use serde::{Serialize, de::DeserializeOwned};

/// Error produced by a codec implementation.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Serializer/deserializer pair for one payload type.
pub trait PayloadCodec {
    type Item;

    fn serialize(&self, item: &Self::Item) -> Result<String, CodecError>;

    fn deserialize(&self, text: &str) -> Result<Self::Item, CodecError>;
}

/// Stores `String` items verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl PayloadCodec for TextCodec {
    type Item = String;

    fn serialize(&self, item: &String) -> Result<String, CodecError> { Ok(item.clone()) }

    fn deserialize(&self, text: &str) -> Result<String, CodecError> { Ok(text.to_owned()) }
}

/// Stores items as single-line JSON.
pub struct JsonCodec<T>(PhantomData<fn() -> T>);

impl<T> JsonCodec<T> {
    #[must_use]
    pub const fn new() -> Self { Self(PhantomData) }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self { Self::new() }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("JsonCodec") }
}

impl<T: Serialize + DeserializeOwned> PayloadCodec for JsonCodec<T> {
    type Item = T;

    fn serialize(&self, item: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(item)?)
    }

    fn deserialize(&self, text: &str) -> Result<T, CodecError> { Ok(serde_json::from_str(text)?) }
}

/// Codec assembled from a pair of closures.
pub struct FnCodec<T, S, D> {
    serialize:   S,
    deserialize: D,
    _item:       PhantomData<fn() -> T>,
}

impl<T, S, D> FnCodec<T, S, D>
where
    S: Fn(&T) -> Result<String, CodecError>,
    D: Fn(&str) -> Result<T, CodecError>,
{
    pub const fn new(serialize: S, deserialize: D) -> Self {
        Self {
            serialize,
            deserialize,
            _item: PhantomData,
        }
    }
}

impl<T, S, D> PayloadCodec for FnCodec<T, S, D>
where
    S: Fn(&T) -> Result<String, CodecError>,
    D: Fn(&str) -> Result<T, CodecError>,
{
    type Item = T;

    fn serialize(&self, item: &T) -> Result<String, CodecError> { (self.serialize)(item) }

    fn deserialize(&self, text: &str) -> Result<T, CodecError> { (self.deserialize)(text) }
}
