//! Block graph helpers

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{BasicBlock, ENTRY_BLOCK};

/// Successor labels of a block, taken from its terminator
pub fn successors(block: &BasicBlock) -> Vec<&str> {
    block.terminator().map(|op| op.jump_targets()).unwrap_or_default()
}

/// Label -> predecessor labels (sorted)
pub fn predecessors(blocks: &BTreeMap<String, BasicBlock>) -> BTreeMap<String, BTreeSet<String>> {
    let mut preds: BTreeMap<String, BTreeSet<String>> = blocks
        .keys()
        .map(|label| (label.clone(), BTreeSet::new()))
        .collect();
    for (label, block) in blocks {
        for succ in successors(block) {
            preds.entry(succ.to_string()).or_default().insert(label.clone());
        }
    }
    preds
}

/// Reverse post-order over the blocks reachable from `entry`
pub fn reverse_post_order(blocks: &BTreeMap<String, BasicBlock>) -> Vec<String> {
    let mut order = Vec::new();
    if !blocks.contains_key(ENTRY_BLOCK) {
        return order;
    }

    let mut visited: HashSet<&str> = HashSet::new();
    // (label, next successor index)
    let mut stack: Vec<(&str, usize)> = vec![(ENTRY_BLOCK, 0)];
    visited.insert(ENTRY_BLOCK);

    while let Some((label, idx)) = stack.pop() {
        let succs = blocks.get(label).map(successors).unwrap_or_default();
        if idx < succs.len() {
            stack.push((label, idx + 1));
            let next = succs[idx];
            if blocks.contains_key(next) && visited.insert(next) {
                stack.push((next, 0));
            }
        } else {
            order.push(label.to_string());
        }
    }

    order.reverse();
    order
}

/// Every label: reachable blocks in reverse post-order, then the rest by name
pub fn block_order(blocks: &BTreeMap<String, BasicBlock>) -> Vec<String> {
    let mut order = reverse_post_order(blocks);
    let seen: HashSet<String> = order.iter().cloned().collect();
    order.extend(blocks.keys().filter(|l| !seen.contains(*l)).cloned());
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SourceInfo;
    use crate::mir::{Constant, MirOp};

    fn jump(to: &str) -> MirOp {
        MirOp::Jump { sinfo: SourceInfo::default(), trgtblock: to.into() }
    }

    fn block(label: &str, ops: Vec<MirOp>) -> (String, BasicBlock) {
        (label.to_string(), BasicBlock { label: label.to_string(), ops })
    }

    fn diamond() -> BTreeMap<String, BasicBlock> {
        BTreeMap::from([
            block(
                "entry",
                vec![MirOp::JumpCond {
                    sinfo: SourceInfo::default(),
                    arg: Constant::True.into(),
                    trueblock: "then_3".into(),
                    falseblock: "else_4".into(),
                }],
            ),
            block("then_3", vec![jump("join_5")]),
            block("else_4", vec![jump("join_5")]),
            block("join_5", vec![jump("returnassign")]),
            block("returnassign", vec![jump("exit")]),
            block("exit", vec![]),
            block("dead_6", vec![jump("exit")]),
        ])
    }

    #[test]
    fn test_reverse_post_order_respects_edges() {
        let order = reverse_post_order(&diamond());
        let pos = |l: &str| order.iter().position(|x| x == l).unwrap();
        assert_eq!(order[0], "entry");
        assert!(pos("then_3") < pos("join_5"));
        assert!(pos("else_4") < pos("join_5"));
        assert!(pos("returnassign") < pos("exit"));
        assert!(!order.contains(&"dead_6".to_string()));
    }

    #[test]
    fn test_block_order_keeps_unreachable_blocks() {
        let order = block_order(&diamond());
        assert_eq!(order.len(), 7);
        assert_eq!(order.last().map(String::as_str), Some("dead_6"));
    }

    #[test]
    fn test_predecessors() {
        let preds = predecessors(&diamond());
        assert_eq!(
            preds["join_5"].iter().cloned().collect::<Vec<_>>(),
            vec!["else_4".to_string(), "then_3".to_string()]
        );
        assert!(preds["entry"].is_empty());
        assert_eq!(preds["exit"].len(), 2);
    }
}
