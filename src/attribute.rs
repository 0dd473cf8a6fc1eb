//! Weight/bias blobs attached to a graph node: raw bytes plus a declared
//! shape and element type, extracted lazily into typed `f32` vectors.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemType {
    Float32,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub elem_type: ElemType,
    pub shape: Vec<i64>,
    data: Vec<u8>,
}

impl Attribute {
    pub fn new(elem_type: ElemType, shape: Vec<i64>, data: Vec<u8>) -> Self {
        Self { elem_type, shape, data }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Reinterprets the raw bytes as `f32`, requiring the buffer length to
    /// be a multiple of the element width. When `need_clear` is set the
    /// backing bytes are dropped after extraction, matching the original's
    /// one-shot `get<T>(need_clear)` contract.
    pub fn get_f32(&mut self, need_clear: bool) -> Vec<f32> {
        assert_eq!(self.elem_type, ElemType::Float32, "only float32 attributes are supported");
        assert_eq!(self.data.len() % 4, 0, "attribute byte length must be a multiple of 4");
        let values: Vec<f32> = self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if need_clear {
            self.data.clear();
        }
        values
    }
}
