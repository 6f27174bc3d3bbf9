//! Scoring and pass-alive (Benson) analysis.

use engine_core::Player;

use crate::Board;

/// Raw point counts used by both scoring rules.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScoreCounts {
    pub black_stones: usize,
    pub white_stones: usize,
    /// Empty points reachable only from black stones.
    pub black_territory: usize,
    pub white_territory: usize,
}

/// Flood-fill connected components of points satisfying `member`.
/// Returns the component id per point (`None` for non-members) and the count.
fn components(board: &Board, member: impl Fn(usize) -> bool) -> (Vec<Option<usize>>, usize) {
    let n = board.stones.len();
    let mut comp = vec![None; n];
    let mut count = 0;
    for start in 0..n {
        if comp[start].is_some() || !member(start) {
            continue;
        }
        comp[start] = Some(count);
        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            for q in board.neighbors(p) {
                if comp[q].is_none() && member(q) {
                    comp[q] = Some(count);
                    stack.push(q);
                }
            }
        }
        count += 1;
    }
    (comp, count)
}

pub(crate) fn score_counts(board: &Board) -> ScoreCounts {
    let mut counts = ScoreCounts::default();
    for stone in board.stones.iter().flatten() {
        match stone {
            Player::Black => counts.black_stones += 1,
            Player::White => counts.white_stones += 1,
        }
    }

    let (regions, num_regions) = components(board, |p| board.stones[p].is_none());
    let mut size = vec![0usize; num_regions];
    let mut touches = vec![[false, false]; num_regions];
    for (p, region) in regions.iter().enumerate() {
        let Some(r) = *region else { continue };
        size[r] += 1;
        for q in board.neighbors(p) {
            match board.stones[q] {
                Some(Player::Black) => touches[r][0] = true,
                Some(Player::White) => touches[r][1] = true,
                None => {}
            }
        }
    }
    for r in 0..num_regions {
        match touches[r] {
            [true, false] => counts.black_territory += size[r],
            [false, true] => counts.white_territory += size[r],
            _ => {}
        }
    }
    counts
}

/// Benson's algorithm for one player. Returns, per point, whether it belongs
/// to a pass-alive chain of `pla` or to a region such a chain encloses as
/// one of its vital regions.
fn pass_alive_for(board: &Board, pla: Player) -> Vec<bool> {
    let n = board.stones.len();
    let (chain_of, num_chains) = components(board, |p| board.stones[p] == Some(pla));
    let (region_of, num_regions) = components(board, |p| board.stones[p] != Some(pla));

    // Chains bordering each region, and the chains each region is vital to:
    // every empty point of the region must be a liberty of the chain.
    let mut bordering: Vec<Vec<usize>> = vec![Vec::new(); num_regions];
    for p in 0..n {
        let Some(r) = region_of[p] else { continue };
        for q in board.neighbors(p) {
            if let Some(c) = chain_of[q] {
                if !bordering[r].contains(&c) {
                    bordering[r].push(c);
                }
            }
        }
    }
    let mut vital_to: Vec<Vec<usize>> = vec![Vec::new(); num_regions];
    for r in 0..num_regions {
        for &c in &bordering[r] {
            let all_liberties = (0..n)
                .filter(|&p| region_of[p] == Some(r) && board.stones[p].is_none())
                .all(|p| board.neighbors(p).any(|q| chain_of[q] == Some(c)));
            if all_liberties {
                vital_to[r].push(c);
            }
        }
    }

    let mut chain_alive = vec![true; num_chains];
    let mut region_healthy = vec![true; num_regions];
    loop {
        let mut changed = false;
        for c in 0..num_chains {
            if !chain_alive[c] {
                continue;
            }
            let vital = (0..num_regions)
                .filter(|&r| region_healthy[r] && vital_to[r].contains(&c))
                .count();
            if vital < 2 {
                chain_alive[c] = false;
                changed = true;
            }
        }
        for r in 0..num_regions {
            if region_healthy[r] && bordering[r].iter().any(|&c| !chain_alive[c]) {
                region_healthy[r] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let region_safe: Vec<bool> = (0..num_regions)
        .map(|r| region_healthy[r] && vital_to[r].iter().any(|&c| chain_alive[c]))
        .collect();
    (0..n)
        .map(|p| match (chain_of[p], region_of[p]) {
            (Some(c), _) => chain_alive[c],
            (None, Some(r)) => region_safe[r],
            (None, None) => false,
        })
        .collect()
}

pub(crate) fn pass_alive_area(board: &Board) -> Vec<Option<Player>> {
    let black = pass_alive_for(board, Player::Black);
    let white = pass_alive_for(board, Player::White);
    black
        .iter()
        .zip(white.iter())
        .map(|(&b, &w)| match (b, w) {
            (true, _) => Some(Player::Black),
            (false, true) => Some(Player::White),
            _ => None,
        })
        .collect()
}
