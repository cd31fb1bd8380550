pub mod phys_mem;
pub mod virt_mem;
