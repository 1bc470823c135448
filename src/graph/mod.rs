//! Partitions the code reachable from an address into basic blocks.
//!
//! Blocks live in an arena and are addressed by [`BlockId`]. Each byte of
//! memory is owned by at most one block, so ranges never overlap. When a walk
//! falls into the start of an existing block, that block is merged onto the
//! end of the walking block. The interpreter never consults the graph; it
//! exists for the JIT.

use std::collections::{BTreeSet};

use crate::arch::{Flow, Instruction, MEMORY_SIZE};
use crate::util::{Fifo};

/** Index of a [`Block`] in a [`Graph`]. */
pub type BlockId = usize;

/** A decoded instruction in a [`Block`]. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub offset: u8,
    pub instruction: Instruction,
    /** For relative branches, the address of the target. */
    pub target: Option<u8>,
}

/** A run of consecutive instructions. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: u8,
    /** Length in bytes. `start + len` does not exceed the memory size. */
    pub len: usize,
    pub nodes: Vec<Node>,
}

impl Block {
    pub fn contains(&self, offset: u8) -> bool {
        (offset as usize) >= (self.start as usize) && (offset as usize) < self.start as usize + self.len
    }

    /** The address after the last instruction, if it is in memory. */
    pub fn end(&self) -> usize { self.start as usize + self.len }

    /** The relative branch targets of the instructions. */
    pub fn targets(&self) -> impl Iterator<Item=u8> + '_ {
        self.nodes.iter().filter_map(|node| node.target)
    }

    /** The encoded bytes of the block. */
    pub fn bytes(&self, memory: &[u8; MEMORY_SIZE]) -> Vec<u8> {
        memory[self.start as usize..self.end()].to_vec()
    }
}

//-----------------------------------------------------------------------------

/** The basic blocks reachable from some entry address. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /** Merged blocks leave `None` behind. */
    blocks: Vec<Option<Block>>,
    owner: [Option<BlockId>; MEMORY_SIZE],
    /** The entry address and every branch target. */
    entries: BTreeSet<u8>,
}

impl Graph {
    /** Builds the graph of the code in `memory` reachable from `pc`. */
    pub fn build(memory: &[u8; MEMORY_SIZE], pc: u8) -> Self {
        let mut graph = Graph {blocks: Vec::new(), owner: [None; MEMORY_SIZE], entries: BTreeSet::new()};
        let mut worklist = Fifo::new();
        worklist.enqueue(pc);
        graph.entries.insert(pc);
        while let Some(start) = worklist.dequeue() {
            if graph.owner[start as usize].is_none() {
                graph.walk(memory, start, &mut worklist);
            }
        }
        graph
    }

    /** Grows a new block from `start` until control flow leaves it. */
    fn walk(&mut self, memory: &[u8; MEMORY_SIZE], start: u8, worklist: &mut Fifo<u8>) {
        let id = self.blocks.len();
        let mut block = Block {start, len: 0, nodes: Vec::new()};
        let mut offset = start as usize;
        while offset < MEMORY_SIZE {
            if let Some(other) = self.owner[offset] {
                if self.blocks[other].as_ref().map(|b| b.start as usize) == Some(offset) {
                    self.merge(&mut block, id, other);
                }
                break;
            }
            let instruction = match Instruction::decode(memory, offset as u8) {
                Some(instruction) => instruction,
                None => break,
            };
            let end = offset + instruction.size as usize;
            if end > MEMORY_SIZE || (offset..end).any(|a| self.owner[a].is_some()) {
                break;
            }
            for a in offset..end { self.owner[a] = Some(id); }
            let target = instruction.branch_target(offset as u8);
            if let Some(target) = target {
                self.entries.insert(target);
                worklist.enqueue(target);
            }
            block.nodes.push(Node {offset: offset as u8, instruction, target});
            block.len = end - start as usize;
            offset = end;
            let flow = instruction.control_flow();
            match flow.flow {
                Flow::None => {},
                Flow::Branch if flow.conditional => {},
                Flow::Io => {
                    if end < MEMORY_SIZE {
                        self.entries.insert(end as u8);
                        worklist.enqueue(end as u8);
                    }
                    break;
                },
                Flow::Branch | Flow::Pause => break,
            }
        }
        self.blocks.push(if block.nodes.is_empty() { None } else { Some(block) });
    }

    /** Appends block `other` to `block`, which will have id `id`. */
    fn merge(&mut self, block: &mut Block, id: BlockId, other: BlockId) {
        if let Some(other_block) = self.blocks[other].take() {
            for a in other_block.start as usize..other_block.end() { self.owner[a] = Some(id); }
            block.len += other_block.len;
            block.nodes.extend(other_block.nodes);
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item=(BlockId, &Block)> + '_ {
        self.blocks.iter().enumerate().filter_map(|(id, b)| b.as_ref().map(|b| (id, b)))
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id).and_then(Option::as_ref)
    }

    /** The block containing `offset`, if any. */
    pub fn owner(&self, offset: u8) -> Option<BlockId> {
        self.owner[offset as usize]
    }

    /** The entry address and the branch targets found. */
    pub fn entries(&self) -> &BTreeSet<u8> { &self.entries }

    /** The block that a branch to `target` enters, if `target` starts an instruction. */
    pub fn successor(&self, target: u8) -> Option<BlockId> {
        let id = self.owner(target)?;
        let block = self.block(id)?;
        block.nodes.iter().any(|n| n.offset == target).then(|| id)
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::assembler::{assemble};

    fn ranges(graph: &Graph) -> Vec<(u8, usize)> {
        let mut ranges: Vec<_> = graph.blocks().map(|(_, b)| (b.start, b.len)).collect();
        ranges.sort();
        ranges
    }

    #[test]
    fn straight_line() {
        let binary = assemble("mov r0, 5\nmov r1, 10\nadd r0, r1\nhlt").unwrap();
        let graph = Graph::build(&binary.data, 0);
        assert_eq!(ranges(&graph), vec![(0, 9)]);
        let (_, block) = graph.blocks().next().unwrap();
        assert_eq!(block.nodes.len(), 4);
        assert_eq!(block.nodes[3].offset, 8);
    }

    #[test]
    fn loop_and_merge() {
        // `mid` is walked first, then `top` falls into it.
        let binary = assemble("\
            jmp mid\n\
            top: add r0, 1\n\
            mid: sub r1, 1\n\
            jnz top\n\
            hlt\n\
        ").unwrap();
        let graph = Graph::build(&binary.data, 0);
        assert_eq!(ranges(&graph), vec![(0, 2), (2, 9)]);
        assert!(graph.entries().contains(&2));
        assert!(graph.entries().contains(&5));
        let id = graph.owner(2).unwrap();
        assert_eq!(graph.owner(10), Some(id));
        assert_eq!(graph.successor(5), Some(id));
        assert_eq!(graph.successor(6), None);
        assert_eq!(graph.block(id).unwrap().nodes.len(), 4);
        let rebuilt = Graph::build(&binary.data, 0);
        assert_eq!(graph, rebuilt);
    }

    #[test]
    fn unconditional_and_io() {
        let binary = assemble("\
            jmp far\n\
            nop\n\
            far: recv 1, [0]\n\
            add r0, 1\n\
            jmp far\n\
        ").unwrap();
        let graph = Graph::build(&binary.data, 0);
        // `nop` is unreachable. `recv` ends a block and its fallthrough starts another.
        assert_eq!(ranges(&graph), vec![(0, 2), (3, 4), (7, 5)]);
        assert_eq!(graph.owner(2), None);
        assert!(graph.entries().contains(&7));
    }

    #[test]
    fn invalid_and_wrap() {
        let mut memory = [0xFFu8; MEMORY_SIZE];
        memory[254] = 0xBC; // nop
        memory[255] = 0xBC;
        let graph = Graph::build(&memory, 254);
        assert_eq!(ranges(&graph), vec![(254, 2)]);
        let empty = Graph::build(&memory, 0);
        assert_eq!(empty.blocks().count(), 0);
    }
}
