pub mod block_tree;
pub mod fork_choice_view;
pub mod proto_block;
