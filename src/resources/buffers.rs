/// Geometry and uniform storage referenced by draw calls.
/// Vertex/attribute data is f64, indices are i32, uniforms are raw bytes
/// divided into fixed-size elements.
use std::mem;
use std::ptr;

pub struct VertexBuffer {
    pub values: Vec<f64>,
    pub components_per_vertex: usize,
}

impl VertexBuffer {
    pub fn new(vertex_count: usize, components_per_vertex: usize) -> Self {
        debug_assert!(vertex_count > 0);
        debug_assert!(components_per_vertex >= 2);
        Self {
            values: vec![0.0; vertex_count * components_per_vertex],
            components_per_vertex,
        }
    }
}

pub struct AttributeBuffer {
    pub values: Vec<f64>,
    pub components_per_vertex: usize,
}

impl AttributeBuffer {
    pub fn new(vertex_count: usize, components_per_vertex: usize) -> Self {
        debug_assert!(vertex_count > 0);
        debug_assert!(components_per_vertex >= 2);
        Self {
            values: vec![0.0; vertex_count * components_per_vertex],
            components_per_vertex,
        }
    }
}

pub struct IndexBuffer {
    pub indices: Vec<i32>,
    pub triangle_count: usize,
}

impl IndexBuffer {
    pub fn new(index_count: usize) -> Self {
        debug_assert!(index_count > 0);
        debug_assert!(
            index_count % 3 == 0,
            "index count {} is not a multiple of 3",
            index_count
        );
        Self {
            indices: vec![0; index_count],
            triangle_count: index_count / 3,
        }
    }
}

/// Untyped per-draw parameter storage (transforms, pre-scale translations).
/// Elements are addressed by index; reads go through `read_unaligned` so the
/// backing bytes need no particular alignment.
pub struct UniformBuffer {
    bytes: Vec<u8>,
    element_count: usize,
    size_of_element: usize,
    alignment_of_element: usize,
}

impl UniformBuffer {
    pub fn new(element_count: usize, size_of_element: usize, alignment_of_element: usize) -> Self {
        debug_assert!(size_of_element > 0);
        debug_assert!(alignment_of_element > 0);
        Self {
            bytes: vec![0; element_count * size_of_element],
            element_count,
            size_of_element,
            alignment_of_element,
        }
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn size_of_element(&self) -> usize {
        self.size_of_element
    }

    pub fn alignment_of_element(&self) -> usize {
        self.alignment_of_element
    }

    pub fn valid_byte_count(&self) -> usize {
        self.element_count * self.size_of_element
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Read one element as `T`. The element size must match `T` exactly;
    /// that is the caller's contract when the buffer was created.
    pub fn get<T: Copy>(&self, index: usize) -> T {
        debug_assert_eq!(mem::size_of::<T>(), self.size_of_element);
        debug_assert!(index < self.element_count);
        let offset = index * self.size_of_element;
        debug_assert!(offset + self.size_of_element <= self.bytes.len());
        unsafe { ptr::read_unaligned(self.bytes.as_ptr().add(offset) as *const T) }
    }

    /// Overwrite one element from raw bytes. Size mismatch is the caller's
    /// error and is checked by the renderer before reaching here.
    pub fn write_element(&mut self, index: usize, data: &[u8]) {
        debug_assert_eq!(data.len(), self.size_of_element);
        let offset = index * self.size_of_element;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }
}
