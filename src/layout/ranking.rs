use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Directed edges as index pairs into the node array. Self-loops are dropped.
pub(super) fn index_edges(count: usize, edges: &[(usize, usize)]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let mut outgoing = vec![Vec::new(); count];
    let mut incoming = vec![Vec::new(); count];
    for &(from, to) in edges {
        if from == to || from >= count || to >= count {
            continue;
        }
        outgoing[from].push(to);
        incoming[to].push(from);
    }
    (outgoing, incoming)
}

/// Longest-path ranks. Cycles are broken by promoting the earliest unprocessed
/// node in input order to a source, so its remaining in-edges act as back-edges.
pub(super) fn longest_path_ranks(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let (outgoing, incoming) = index_edges(count, edges);
    let mut indeg: Vec<usize> = incoming.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&idx| indeg[idx] == 0)
        .map(Reverse)
        .collect();
    let mut processed = vec![false; count];
    let mut order = Vec::with_capacity(count);

    loop {
        while let Some(Reverse(idx)) = ready.pop() {
            if processed[idx] {
                continue;
            }
            processed[idx] = true;
            order.push(idx);
            for &next in &outgoing[idx] {
                if processed[next] {
                    continue;
                }
                indeg[next] = indeg[next].saturating_sub(1);
                if indeg[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        if order.len() >= count {
            break;
        }
        match (0..count).find(|&idx| !processed[idx]) {
            Some(idx) => ready.push(Reverse(idx)),
            None => break,
        }
    }

    let mut position = vec![0usize; count];
    for (pos, &idx) in order.iter().enumerate() {
        position[idx] = pos;
    }
    let mut ranks = vec![0usize; count];
    for &idx in &order {
        for &next in &outgoing[idx] {
            if position[next] <= position[idx] {
                continue;
            }
            ranks[next] = ranks[next].max(ranks[idx] + 1);
        }
    }
    ranks
}

pub(super) fn rank_buckets(ranks: &[usize]) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().map(|max| max + 1).unwrap_or(0);
    let mut buckets = vec![Vec::new(); depth];
    for (idx, &rank) in ranks.iter().enumerate() {
        buckets[rank].push(idx);
    }
    buckets
}

/// Barycentric-median sweeps (down then up) to reduce crossings between ranks.
pub(super) fn order_rank_nodes(buckets: &mut [Vec<usize>], edges: &[(usize, usize)], passes: usize) {
    if buckets.len() <= 1 {
        return;
    }
    let count = buckets.iter().map(Vec::len).sum::<usize>().max(
        buckets
            .iter()
            .flatten()
            .copied()
            .max()
            .map(|max| max + 1)
            .unwrap_or(0),
    );
    let (outgoing, incoming) = index_edges(count, edges);
    let mut positions = vec![0usize; count];
    let refresh = |buckets: &[Vec<usize>], positions: &mut Vec<usize>| {
        for bucket in buckets {
            for (pos, &idx) in bucket.iter().enumerate() {
                positions[idx] = pos;
            }
        }
    };
    refresh(buckets, &mut positions);

    for _ in 0..passes.max(1) {
        for rank in 1..buckets.len() {
            sort_bucket(&mut buckets[rank], &incoming, &positions);
            refresh(buckets, &mut positions);
        }
        for rank in (0..buckets.len() - 1).rev() {
            sort_bucket(&mut buckets[rank], &outgoing, &positions);
            refresh(buckets, &mut positions);
        }
    }
}

fn sort_bucket(bucket: &mut [usize], neighbors: &[Vec<usize>], positions: &[usize]) {
    if bucket.len() <= 1 {
        return;
    }
    let mut keyed: Vec<(f32, usize, usize)> = bucket
        .iter()
        .map(|&idx| (median_position(idx, neighbors, positions), positions[idx], idx))
        .collect();
    keyed.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    for (slot, (_, _, idx)) in bucket.iter_mut().zip(keyed) {
        *slot = idx;
    }
}

pub(super) fn median_position(idx: usize, neighbors: &[Vec<usize>], positions: &[usize]) -> f32 {
    let mut values: Vec<f32> = neighbors[idx]
        .iter()
        .map(|&neighbor| positions[neighbor] as f32)
        .collect();
    if values.is_empty() {
        return positions[idx] as f32;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}

/// Nodes in tree-by-rank order: rank by rank, each rank crossing-reduced.
pub(super) fn tree_by_rank_order(count: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let ranks = longest_path_ranks(count, edges);
    let mut buckets = rank_buckets(&ranks);
    order_rank_nodes(&mut buckets, edges, 2);
    buckets.into_iter().flatten().collect()
}
