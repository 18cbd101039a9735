// Escrow server library
// 에스크로 / 지갑 서버 (바이너리와 통합 테스트가 공유)
pub mod domains;
pub mod shared;
pub mod routes;
