use crate::domain::entities::position::Position;
use crate::domain::error::DomainError;

pub trait PositionRepository: Send + Sync {
    fn add_position(&self, position: &Position) -> Result<(), DomainError>;
    fn close_position(&self, id: &str) -> Result<(), DomainError>;
    fn open_positions(&self, user_id: &str) -> Result<Vec<Position>, DomainError>;
}
