mod delta_properties_test;
mod local_file_test;
mod pipeline_test;
