mod fusion;
mod jacobians;
