pub mod stub_qbt;
