//! Rule Engine
//!
//! Move validation over a piece list. Two move shapes exist:
//!
//! - **Step**: one square in any of the 8 directions.
//! - **Capture**: up to two squares along each axis (diagonal, horizontal
//!   or vertical) with an opposing piece on the floored midpoint square.
//!
//! The capture rule is deliberately more permissive than classical
//! checkers. Keep it as is.

use crate::core::board::Square;
use crate::game::state::{Color, Piece};

/// Longest reach of a capture jump along either axis.
pub const MAX_JUMP: u8 = 2;

/// Longest reach of a simple step along either axis.
pub const MAX_STEP: u8 = 1;

/// Shape of a legal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    /// Single-square move.
    Step,
    /// Jump removing the opposing piece at `captured`.
    Capture {
        /// Square of the removed piece.
        captured: Square,
    },
}

impl MoveKind {
    /// Square of the captured piece, if any.
    pub fn captured(self) -> Option<Square> {
        match self {
            MoveKind::Step => None,
            MoveKind::Capture { captured } => Some(captured),
        }
    }
}

/// Why a move was not applied.
///
/// Internal only: clients observe every rejection as "nothing happened".
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    /// No session exists for the room.
    #[error("unknown room")]
    UnknownRoom,
    /// The game already has a winner.
    #[error("game is over")]
    GameOver,
    /// Submitted color does not hold the turn.
    #[error("not {0}'s turn")]
    NotYourTurn(Color),
    /// No piece of the submitted color at the origin.
    #[error("no {0} piece at square {1}")]
    NoPieceAtOrigin(Color, Square),
    /// Destination already holds a piece.
    #[error("square {0} is occupied")]
    DestinationOccupied(Square),
    /// Origin and destination are the same square.
    #[error("null move")]
    NullMove,
    /// Neither a step nor a capture.
    #[error("move from {from} to {to} is out of reach")]
    TooFar {
        /// Origin square.
        from: Square,
        /// Destination square.
        to: Square,
    },
}

/// Piece at `square`, if any.
#[inline]
pub fn piece_at(pieces: &[Piece], square: Square) -> Option<&Piece> {
    pieces.iter().find(|p| p.position == square)
}

/// Square whose piece a capture from `from` to `to` removes.
#[inline]
pub fn captured_square(from: Square, to: Square) -> Square {
    from.midpoint(to)
}

/// Whether `from -> to` is a capture jump for `turn`.
///
/// Does not look at the destination; `is_legal_move` rejects occupied
/// destinations before consulting this.
pub fn is_capture(from: Square, to: Square, pieces: &[Piece], turn: Color) -> bool {
    let (row_diff, col_diff) = from.delta(to);
    if row_diff > MAX_JUMP || col_diff > MAX_JUMP || (row_diff == 0 && col_diff == 0) {
        return false;
    }

    piece_at(pieces, captured_square(from, to)).is_some_and(|p| p.color != turn)
}

/// Whether `from -> to` is a legal move for `turn`.
///
/// Does not check that `turn` owns the piece at `from`; that is the
/// session's job.
pub fn is_legal_move(from: Square, to: Square, pieces: &[Piece], turn: Color) -> bool {
    validate_move(from, to, pieces, turn).is_ok()
}

/// Classify a move or explain why it is illegal.
pub fn validate_move(
    from: Square,
    to: Square,
    pieces: &[Piece],
    turn: Color,
) -> Result<MoveKind, MoveRejection> {
    if piece_at(pieces, to).is_some() {
        return Err(MoveRejection::DestinationOccupied(to));
    }

    if is_capture(from, to, pieces, turn) {
        return Ok(MoveKind::Capture { captured: captured_square(from, to) });
    }

    let (row_diff, col_diff) = from.delta(to);
    if row_diff == 0 && col_diff == 0 {
        return Err(MoveRejection::NullMove);
    }
    if row_diff <= MAX_STEP && col_diff <= MAX_STEP {
        Ok(MoveKind::Step)
    } else {
        Err(MoveRejection::TooFar { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::board::BOARD_SIZE;
    use proptest::prelude::*;

    fn sq(index: i64) -> Square {
        Square::new(index).unwrap()
    }

    fn piece(color: Color, index: i64) -> Piece {
        Piece::new(color, sq(index))
    }

    #[test]
    fn test_simple_diagonal_step() {
        let pieces = vec![piece(Color::Red, 9)];
        assert!(is_legal_move(sq(9), sq(18), &pieces, Color::Red));
        assert!(!is_capture(sq(9), sq(18), &pieces, Color::Red));
        assert_eq!(validate_move(sq(9), sq(18), &pieces, Color::Red), Ok(MoveKind::Step));
    }

    #[test]
    fn test_diagonal_capture() {
        let pieces = vec![piece(Color::Red, 17), piece(Color::Blue, 26)];
        assert!(is_capture(sq(17), sq(35), &pieces, Color::Red));
        assert_eq!(
            validate_move(sq(17), sq(35), &pieces, Color::Red),
            Ok(MoveKind::Capture { captured: sq(26) })
        );
    }

    #[test]
    fn test_straight_line_capture() {
        // Vertical jump 8 -> 24 over 16
        let pieces = vec![piece(Color::Red, 8), piece(Color::Blue, 16)];
        assert!(is_legal_move(sq(8), sq(24), &pieces, Color::Red));

        // Horizontal jump 26 -> 28 over 27
        let pieces = vec![piece(Color::Blue, 26), piece(Color::Red, 27)];
        assert_eq!(
            validate_move(sq(26), sq(28), &pieces, Color::Blue),
            Ok(MoveKind::Capture { captured: sq(27) })
        );
    }

    #[test]
    fn test_cannot_capture_own_piece() {
        let pieces = vec![piece(Color::Red, 17), piece(Color::Red, 26)];
        assert!(!is_capture(sq(17), sq(35), &pieces, Color::Red));
        assert!(matches!(
            validate_move(sq(17), sq(35), &pieces, Color::Red),
            Err(MoveRejection::TooFar { .. })
        ));
    }

    #[test]
    fn test_occupied_destination() {
        let pieces = vec![piece(Color::Red, 9), piece(Color::Blue, 18)];
        assert_eq!(
            validate_move(sq(9), sq(18), &pieces, Color::Red),
            Err(MoveRejection::DestinationOccupied(sq(18)))
        );

        // Also blocks a capture landing square
        let pieces = vec![piece(Color::Red, 17), piece(Color::Blue, 26), piece(Color::Blue, 35)];
        assert!(!is_legal_move(sq(17), sq(35), &pieces, Color::Red));
    }

    #[test]
    fn test_jump_without_victim_is_too_far() {
        let pieces = vec![piece(Color::Red, 17)];
        assert_eq!(
            validate_move(sq(17), sq(35), &pieces, Color::Red),
            Err(MoveRejection::TooFar { from: sq(17), to: sq(35) })
        );
    }

    #[test]
    fn test_three_square_move_rejected() {
        let pieces = vec![piece(Color::Red, 0), piece(Color::Blue, 9)];
        assert!(!is_legal_move(sq(0), sq(27), &pieces, Color::Red));
    }

    #[test]
    fn test_null_move() {
        let pieces = vec![piece(Color::Red, 20)];
        // Origin holds the mover itself, so "to" is occupied first
        assert_eq!(
            validate_move(sq(20), sq(20), &pieces, Color::Red),
            Err(MoveRejection::DestinationOccupied(sq(20)))
        );
        assert_eq!(validate_move(sq(20), sq(20), &[], Color::Red), Err(MoveRejection::NullMove));
    }

    #[test]
    fn test_odd_jump_uses_floored_midpoint() {
        // (0,0) -> (2,1): midpoint floors to (1,0) = 8
        let pieces = vec![piece(Color::Red, 0), piece(Color::Blue, 8)];
        assert_eq!(
            validate_move(sq(0), sq(17), &pieces, Color::Red),
            Ok(MoveKind::Capture { captured: sq(8) })
        );
    }

    fn arb_square() -> impl Strategy<Value = Square> {
        (0i64..64).prop_map(|i| Square::new(i).unwrap())
    }

    fn arb_color() -> impl Strategy<Value = Color> {
        prop_oneof![Just(Color::Red), Just(Color::Blue)]
    }

    proptest! {
        #[test]
        fn prop_adjacent_moves_are_legal(
            from in arb_square(),
            dr in -1i32..=1,
            dc in -1i32..=1,
            turn in arb_color(),
            victim in arb_square(),
        ) {
            prop_assume!(dr != 0 || dc != 0);
            let row = from.row() as i32 + dr;
            let col = from.col() as i32 + dc;
            prop_assume!((0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col));
            let to = Square::from_row_col(row as u8, col as u8).unwrap();

            // An arbitrary extra opposing piece must not make a step illegal.
            let mut pieces = vec![Piece::new(turn, from)];
            if victim != from && victim != to {
                pieces.push(Piece::new(turn.opponent(), victim));
            }

            prop_assert!(is_legal_move(from, to, &pieces, turn));
        }

        #[test]
        fn prop_jump_over_opponent_is_capture(
            from in arb_square(),
            dr in -2i32..=2,
            dc in -2i32..=2,
            turn in arb_color(),
        ) {
            prop_assume!(dr != 0 || dc != 0);
            let row = from.row() as i32 + dr;
            let col = from.col() as i32 + dc;
            prop_assume!((0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col));
            let to = Square::from_row_col(row as u8, col as u8).unwrap();
            let mid = captured_square(from, to);
            prop_assume!(mid != from && mid != to);

            let pieces = vec![Piece::new(turn, from), Piece::new(turn.opponent(), mid)];
            prop_assert!(is_capture(from, to, &pieces, turn));
            prop_assert!(is_legal_move(from, to, &pieces, turn));
            prop_assert_eq!(validate_move(from, to, &pieces, turn), Ok(MoveKind::Capture { captured: mid }));
        }

        #[test]
        fn prop_predicates_agree_with_validate(
            from in arb_square(),
            to in arb_square(),
            turn in arb_color(),
            others in proptest::collection::btree_map(arb_square(), arb_color(), 0..12),
        ) {
            let mut pieces = vec![Piece::new(turn, from)];
            pieces.extend(
                others.into_iter()
                    .filter(|(s, _)| *s != from)
                    .map(|(s, c)| Piece::new(c, s)),
            );

            let result = validate_move(from, to, &pieces, turn);
            prop_assert_eq!(result.is_ok(), is_legal_move(from, to, &pieces, turn));
            if matches!(result, Ok(MoveKind::Capture { .. })) {
                prop_assert!(is_capture(from, to, &pieces, turn));
            }

            let (dr, dc) = from.delta(to);
            if dr > MAX_JUMP || dc > MAX_JUMP {
                prop_assert!(result.is_err());
            }
        }
    }
}
