//! Control-flow graph over a [`FunctionBody`]: predecessor/successor edges,
//! dominators, and loop-header detection. Built once per function ahead of
//! the hot-call optimizer pipeline; several passes (loop-invariant code
//! motion, refslot promotion) consult dominance to decide what may float
//! above a branch.

use crate::mir::*;
use std::collections::{HashMap, HashSet, VecDeque};

pub const ENTRY_BLOCK: BlockId = BlockId(0);

/// Returns the block's immediate successors, reading its (sole) terminator.
/// A block with no terminator yet (mid-construction) has no successors.
pub fn terminator_targets(block: &Block) -> Vec<BlockId> {
    match block.instrs.last().map(|i| &i.kind) {
        Some(InstrKind::Br { target }) => vec![*target],
        Some(InstrKind::TestBr { true_blk, false_blk, .. }) => vec![*true_blk, *false_blk],
        Some(InstrKind::Return { .. }) | None => vec![],
        _ => vec![],
    }
}

pub struct ControlFlowGraph {
    pub predecessors: HashMap<BlockId, HashSet<BlockId>>,
    pub successors: HashMap<BlockId, HashSet<BlockId>>,
    pub idom: HashMap<BlockId, BlockId>,
    /// Reverse-postorder index: `ENTRY_BLOCK` is 0, increasing away from it.
    /// Blocks unreachable from `ENTRY_BLOCK` have no entry.
    pub rpo: HashMap<BlockId, u32>,
}

impl ControlFlowGraph {
    pub fn new(body: &FunctionBody) -> Self {
        let mut predecessors: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();
        let mut successors: HashMap<BlockId, HashSet<BlockId>> = HashMap::new();

        for (id, _) in body.blocks.iter_enumerated() {
            predecessors.insert(id, HashSet::new());
            successors.insert(id, HashSet::new());
        }

        for (id, block) in body.blocks.iter_enumerated() {
            for target in terminator_targets(block) {
                successors.get_mut(&id).unwrap().insert(target);
                predecessors.get_mut(&target).unwrap().insert(id);
            }
        }

        let mut cfg = Self { predecessors, successors, idom: HashMap::new(), rpo: HashMap::new() };
        cfg.compute_dominators();
        cfg
    }

    /// Cooper-Harvey-Kennedy's iterative semi-dominator computation ("A
    /// Simple, Fast Dominance Algorithm"): number blocks in reverse
    /// postorder, then repeatedly intersect each block's processed
    /// predecessors' immediate dominators by walking two fingers up the
    /// partially-built idom tree until they land on the same RPO index.
    /// Converges in a handful of passes for the block counts this
    /// optimizer ever sees and needs no auxiliary dominator-set per block.
    fn compute_dominators(&mut self) {
        let entry = ENTRY_BLOCK;
        if !self.predecessors.contains_key(&entry) {
            return;
        }

        let postorder = compute_postorder(&self.successors, entry);
        let n = postorder.len() as u32;
        let rpo: HashMap<BlockId, u32> = postorder.iter().map(|(&node, &po)| (node, n - 1 - po)).collect();

        let mut order: Vec<BlockId> = rpo.keys().copied().collect();
        order.sort_by_key(|b| rpo[b]);

        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(entry, entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in &order {
                if b == entry {
                    continue;
                }
                let mut new_idom: Option<BlockId> = None;
                for &p in &self.predecessors[&b] {
                    if !idom.contains_key(&p) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, &rpo, p, cur),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&b) != Some(&new_idom) {
                        idom.insert(b, new_idom);
                        changed = true;
                    }
                }
            }
        }

        self.rpo = rpo;
        self.idom = idom;
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(ENTRY_BLOCK);
        visited.insert(ENTRY_BLOCK);
        while let Some(current) = queue.pop_front() {
            if current == block {
                return true;
            }
            for &succ in &self.successors[&current] {
                if visited.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }
        false
    }

    /// Natural loops: a header is any block with a back-edge from one of
    /// its own successors.
    pub fn find_loops(&self) -> HashMap<BlockId, LoopInfo> {
        let mut loops = HashMap::new();
        for (header, preds) in &self.predecessors {
            if !preds.contains(header) {
                continue;
            }
            let mut loop_blocks = HashSet::new();
            let mut queue: VecDeque<BlockId> = preds.iter().filter(|&&p| p != *header).copied().collect();
            while let Some(block) = queue.pop_front() {
                if block == *header || !loop_blocks.insert(block) {
                    continue;
                }
                for &pred in &self.predecessors[&block] {
                    if !loop_blocks.contains(&pred) {
                        queue.push_back(pred);
                    }
                }
            }
            loops.insert(*header, LoopInfo { header: *header, blocks: loop_blocks });
        }
        loops
    }
}

#[derive(Debug)]
pub struct LoopInfo {
    pub header: BlockId,
    pub blocks: HashSet<BlockId>,
}

fn compute_postorder(successors: &HashMap<BlockId, HashSet<BlockId>>, entry: BlockId) -> HashMap<BlockId, u32> {
    let mut visited = HashSet::new();
    let mut postorder = HashMap::new();
    let mut counter = 0;

    fn dfs(
        node: BlockId,
        successors: &HashMap<BlockId, HashSet<BlockId>>,
        visited: &mut HashSet<BlockId>,
        postorder: &mut HashMap<BlockId, u32>,
        counter: &mut u32,
    ) {
        visited.insert(node);
        if let Some(succs) = successors.get(&node) {
            for &succ in succs {
                if !visited.contains(&succ) {
                    dfs(succ, successors, visited, postorder, counter);
                }
            }
        }
        postorder.insert(node, *counter);
        *counter += 1;
    }

    dfs(entry, successors, &mut visited, &mut postorder, &mut counter);
    postorder
}

/// The two-finger walk: climbs both candidates' idom chains, each step
/// advancing whichever finger sits at the larger RPO index, until they
/// meet at their common dominator.
fn intersect(idom: &HashMap<BlockId, BlockId>, rpo: &HashMap<BlockId, u32>, b1: BlockId, b2: BlockId) -> BlockId {
    let mut finger1 = b1;
    let mut finger2 = b2;
    while finger1 != finger2 {
        while rpo[&finger1] > rpo[&finger2] {
            finger1 = idom[&finger1];
        }
        while rpo[&finger2] > rpo[&finger1] {
            finger2 = idom[&finger2];
        }
    }
    finger1
}

/// `a` dominates `b` iff `a` lies on `b`'s immediate-dominator chain.
/// Walks that chain from `b` towards the entry block, stopping as soon as
/// it lands on `a` or passes a shallower RPO index than `a`'s (at which
/// point `a` cannot appear further up the chain).
pub fn dominates(cfg: &ControlFlowGraph, a: BlockId, b: BlockId) -> bool {
    if a == b {
        return true;
    }
    let Some(&a_rpo) = cfg.rpo.get(&a) else { return false };
    let mut cur = b;
    loop {
        let Some(&up) = cfg.idom.get(&cur) else { return false };
        if up == cur {
            // Reached the entry block (its own idom) without finding `a`.
            return up == a;
        }
        if up == a {
            return true;
        }
        if cfg.rpo[&up] <= a_rpo {
            return false;
        }
        cur = up;
    }
}

pub fn dominated_blocks(cfg: &ControlFlowGraph, block: BlockId) -> Vec<BlockId> {
    cfg.rpo.keys().filter(|&&b| dominates(cfg, block, b)).copied().collect()
}

#[cfg(test)]
mod edge_cases {
    use super::*;
    use crate::builder::Builder;

    #[test]
    fn straight_line_function_has_no_loops() {
        let mut b = Builder::new(None, 0, false, false);
        b.ret(Arg::Value(fgc::Value::Null));
        let func = b.build();
        let cfg = ControlFlowGraph::new(&func.body);
        assert!(cfg.find_loops().is_empty());
    }

    #[test]
    fn branch_targets_are_both_dominated_by_entry() {
        let mut b = Builder::new(None, 0, false, false);
        let then_blk = b.new_block();
        let else_blk = b.new_block();
        b.set_current_block(ENTRY_BLOCK);
        b.test_branch(Arg::Value(fgc::Value::Bool(true)), then_blk, else_blk);
        b.set_current_block(then_blk);
        b.ret(Arg::Value(fgc::Value::Null));
        b.set_current_block(else_blk);
        b.ret(Arg::Value(fgc::Value::Null));
        let func = b.build();
        let cfg = ControlFlowGraph::new(&func.body);
        assert!(dominates(&cfg, ENTRY_BLOCK, then_blk));
        assert!(dominates(&cfg, ENTRY_BLOCK, else_blk));
        assert!(cfg.is_reachable(then_blk));
        assert!(cfg.is_reachable(else_blk));
    }

    #[test]
    fn diamond_join_is_dominated_by_entry_but_not_either_arm() {
        let mut b = Builder::new(None, 0, false, false);
        let then_blk = b.new_block();
        let else_blk = b.new_block();
        let join_blk = b.new_block();
        b.set_current_block(ENTRY_BLOCK);
        b.test_branch(Arg::Value(fgc::Value::Bool(true)), then_blk, else_blk);
        b.set_current_block(then_blk);
        b.branch(join_blk);
        b.set_current_block(else_blk);
        b.branch(join_blk);
        b.set_current_block(join_blk);
        b.ret(Arg::Value(fgc::Value::Null));
        let func = b.build();
        let cfg = ControlFlowGraph::new(&func.body);
        assert!(dominates(&cfg, ENTRY_BLOCK, join_blk));
        assert!(!dominates(&cfg, then_blk, join_blk));
        assert!(!dominates(&cfg, else_blk, join_blk));
        assert_eq!(cfg.idom[&join_blk], ENTRY_BLOCK);
    }

    #[test]
    fn back_edge_is_detected_as_a_loop() {
        let mut b = Builder::new(None, 0, false, false);
        let header = b.new_block();
        let exit = b.new_block();
        b.set_current_block(ENTRY_BLOCK);
        b.branch(header);
        b.set_current_block(header);
        b.test_branch(Arg::Value(fgc::Value::Bool(true)), header, exit);
        b.set_current_block(exit);
        b.ret(Arg::Value(fgc::Value::Null));
        let func = b.build();
        let cfg = ControlFlowGraph::new(&func.body);
        assert!(cfg.find_loops().contains_key(&header));
    }
}
