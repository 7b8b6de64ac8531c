//! Tag trees (ISO/IEC 15444-1 B.10.2).
//!
//! A tag tree codes a 2-D array of non-negative integers by quadtree
//! reduction: every node holds the minimum of its children. Coding answers
//! threshold questions top-down and keeps the answered bound (`low`) per
//! node across packets, which is what lets inclusion information accumulate
//! layer by layer.

use super::bit_io::{PacketBitReader, PacketBitWriter};
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    value: i32,
    low: i32,
    known: bool,
    parent: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct TagTree {
    width: usize,
    height: usize,
    nodes: Vec<Node>,
}

impl TagTree {
    /// Build a tree over a `width` x `height` leaf grid. Levels shrink by
    /// ceil-halving until a single root remains.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut level_dims = Vec::new();
        let (mut w, mut h) = (width, height);
        loop {
            level_dims.push((w, h));
            if w == 1 && h == 1 {
                break;
            }
            w = w.div_ceil(2);
            h = h.div_ceil(2);
        }

        let total: usize = level_dims.iter().map(|&(w, h)| w * h).sum();
        let mut nodes = vec![Node::default(); total];

        // Wire each node to its parent in the next level up.
        let mut level_start = 0usize;
        for (level, &(w, h)) in level_dims.iter().enumerate() {
            if level + 1 == level_dims.len() {
                break;
            }
            let (pw, _) = level_dims[level + 1];
            let parent_start = level_start + w * h;
            for y in 0..h {
                for x in 0..w {
                    let parent = parent_start + (y / 2) * pw + x / 2;
                    nodes[level_start + y * w + x].parent = Some(parent as u32);
                }
            }
            level_start = parent_start;
        }

        Self {
            width,
            height,
            nodes,
        }
    }

    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.value = 0;
            node.low = 0;
            node.known = false;
        }
    }

    /// Set one leaf value; internal minima are recomputed by `finalize`.
    pub fn set_value(&mut self, x: usize, y: usize, value: i32) {
        self.nodes[y * self.width + x].value = value;
    }

    /// Propagate leaf values up so every node holds the minimum below it.
    /// Must be called after the leaves change and before encoding.
    pub fn finalize(&mut self) {
        // Reset internal nodes to a sentinel, then fold leaves upward.
        for node in &mut self.nodes[self.width * self.height..] {
            node.value = i32::MAX;
        }
        for i in 0..self.nodes.len() {
            let value = self.nodes[i].value;
            if let Some(parent) = self.nodes[i].parent {
                let parent = parent as usize;
                if value < self.nodes[parent].value {
                    self.nodes[parent].value = value;
                }
            }
        }
    }

    fn path_to(&self, x: usize, y: usize) -> Vec<usize> {
        let mut path = Vec::with_capacity(8);
        let mut index = y * self.width + x;
        path.push(index);
        while let Some(parent) = self.nodes[index].parent {
            index = parent as usize;
            path.push(index);
        }
        path.reverse();
        path
    }

    /// Emit the decisions that tell the decoder whether the leaf value is
    /// below `threshold`, given everything already emitted for earlier
    /// thresholds and neighbouring leaves.
    pub fn encode(&mut self, writer: &mut PacketBitWriter, x: usize, y: usize, threshold: i32) {
        let mut low = 0i32;
        for &index in &self.path_to(x, y) {
            if self.nodes[index].low < low {
                self.nodes[index].low = low;
            } else {
                low = self.nodes[index].low;
            }
            while low < threshold {
                if low >= self.nodes[index].value {
                    if !self.nodes[index].known {
                        writer.put_bit(1);
                        self.nodes[index].known = true;
                    }
                    break;
                }
                writer.put_bit(0);
                low += 1;
            }
            self.nodes[index].low = low;
            if !self.nodes[index].known {
                break;
            }
        }
    }

    /// Decode whether the leaf value is below `threshold`. Returns true once
    /// the value is fully resolved (and `< threshold`).
    pub fn decode(
        &mut self,
        reader: &mut PacketBitReader,
        x: usize,
        y: usize,
        threshold: i32,
    ) -> Result<bool, CodecError> {
        let mut low = 0i32;
        for &index in &self.path_to(x, y) {
            if self.nodes[index].low < low {
                self.nodes[index].low = low;
            } else {
                low = self.nodes[index].low;
            }
            while !self.nodes[index].known && low < threshold {
                if reader.get_bit()? == 1 {
                    self.nodes[index].known = true;
                } else {
                    low += 1;
                }
            }
            self.nodes[index].low = low;
            if !self.nodes[index].known {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolved value at a leaf (valid once `decode` returned true, or on
    /// the encoder side at any time).
    pub fn value(&self, x: usize, y: usize) -> i32 {
        let node = &self.nodes[y * self.width + x];
        if node.known {
            node.low
        } else {
            node.value
        }
    }

    /// Decode a fully resolved leaf value by raising the threshold until the
    /// tree answers (used for zero-bitplane counts).
    pub fn decode_value(
        &mut self,
        reader: &mut PacketBitReader,
        x: usize,
        y: usize,
    ) -> Result<i32, CodecError> {
        let mut threshold = 1;
        while !self.decode(reader, x, y, threshold)? {
            threshold += 1;
            if threshold > u16::MAX as i32 {
                return Err(CodecError::InvalidPacketHeader);
            }
        }
        Ok(self.nodes[y * self.width + x].low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::bit_io::{PacketBitReader, PacketBitWriter};

    fn roundtrip_grid(values: &[i32], width: usize, height: usize) {
        let mut tree = TagTree::new(width, height);
        for y in 0..height {
            for x in 0..width {
                tree.set_value(x, y, values[y * width + x]);
            }
        }
        tree.finalize();

        let mut writer = PacketBitWriter::new();
        for y in 0..height {
            for x in 0..width {
                let v = values[y * width + x];
                tree.encode(&mut writer, x, y, v + 1);
            }
        }
        let bytes = writer.finish();

        let mut decoded = TagTree::new(width, height);
        let mut reader = PacketBitReader::new(&bytes);
        for y in 0..height {
            for x in 0..width {
                let v = decoded.decode_value(&mut reader, x, y).unwrap();
                assert_eq!(v, values[y * width + x], "leaf ({x},{y})");
            }
        }
    }

    #[test]
    fn single_leaf() {
        roundtrip_grid(&[3], 1, 1);
    }

    #[test]
    fn small_grids() {
        roundtrip_grid(&[0, 1, 2, 3], 2, 2);
        roundtrip_grid(&[5, 0, 3, 1, 4, 2], 3, 2);
        roundtrip_grid(&[1; 12], 4, 3);
    }

    #[test]
    fn incremental_thresholds_accumulate_state() {
        // Inclusion-tree usage: raise the threshold one layer at a time and
        // observe the first layer at which each leaf resolves.
        let values = [2i32, 0, 1, 3];
        let mut tree = TagTree::new(2, 2);
        for (i, &v) in values.iter().enumerate() {
            tree.set_value(i % 2, i / 2, v);
        }
        tree.finalize();

        let mut writer = PacketBitWriter::new();
        for layer in 0..4i32 {
            for i in 0..4usize {
                tree.encode(&mut writer, i % 2, i / 2, layer + 1);
            }
        }
        let bytes = writer.finish();

        let mut decoded = TagTree::new(2, 2);
        let mut reader = PacketBitReader::new(&bytes);
        let mut first_resolved = [None; 4];
        for layer in 0..4i32 {
            for i in 0..4usize {
                if decoded
                    .decode(&mut reader, i % 2, i / 2, layer + 1)
                    .unwrap()
                    && first_resolved[i].is_none()
                {
                    first_resolved[i] = Some(layer);
                }
            }
        }
        for i in 0..4 {
            assert_eq!(first_resolved[i], Some(values[i]));
        }
    }
}
