pub mod leaderboard;
pub mod system;
