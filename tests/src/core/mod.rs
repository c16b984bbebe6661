mod block;
mod location;
mod opt;
mod types;
